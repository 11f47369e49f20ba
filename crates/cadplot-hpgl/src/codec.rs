//! PE (polyline encoded) numbers and HPGL/2 drawing commands.
//!
//! A PE number is the rounded value scaled by 2^frac_bits, zig-zag mapped
//! to an unsigned integer (2x for x >= 0, 2|x|+1 otherwise) and written as
//! little endian digits of the base. Non-terminal digits start at byte 63,
//! the terminal digit starts at byte 191 for base 64 and at byte 95 for
//! base 32. Every digit byte is above the PE flag bytes and `;`.

use cadplot_geom::{Path2d, PathElement};
use cadplot_math::{Point2, Vec2};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{DecodeError, Result};

const DIGIT_OFFSET: u8 = 63;
const TERMINATOR: u8 = b';';
const FLAG_SEVEN_BIT: u8 = b'7';
const FLAG_FRACTIONAL_BITS: u8 = b'>';
const FLAG_PEN_UP: u8 = b'<';
const FLAG_ABSOLUTE: u8 = b'=';

/// Digit base of PE numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeBase {
    /// 7-bit transmission, commands start with `PE7`.
    Base32,
    /// 8-bit transmission.
    #[default]
    Base64,
}

impl PeBase {
    /// Numeric radix.
    pub fn radix(self) -> u64 {
        match self {
            PeBase::Base32 => 32,
            PeBase::Base64 => 64,
        }
    }

    fn terminal_offset(self) -> u8 {
        match self {
            PeBase::Base32 => 95,
            PeBase::Base64 => 191,
        }
    }

    fn header(self) -> &'static [u8] {
        match self {
            PeBase::Base32 => b"PE7",
            PeBase::Base64 => b"PE",
        }
    }

    /// Classify a byte as `(digit, is_terminal)`.
    fn digit(self, byte: u8) -> Option<(u64, bool)> {
        let radix = self.radix();
        let terminal = self.terminal_offset();
        if byte >= terminal && u64::from(byte - terminal) < radix {
            Some((u64::from(byte - terminal), true))
        } else if byte >= DIGIT_OFFSET && u64::from(byte - DIGIT_OFFSET) < radix {
            Some((u64::from(byte - DIGIT_OFFSET), false))
        } else {
            None
        }
    }
}

fn fixed_point_scale(frac_bits: u32) -> f64 {
    2f64.powi(frac_bits as i32)
}

/// Largest magnitude of a quantized coordinate. Deltas between two
/// coordinates stay far below the zig-zag limit and decode exactly as `f64`.
pub const MAX_PE_VALUE: i64 = 1 << 52;

/// Scale and round `value`; NaN becomes 0 and out of range values are
/// clamped to [`MAX_PE_VALUE`].
fn quantize(value: f64, frac_bits: u32) -> i64 {
    let scaled = (value * fixed_point_scale(frac_bits)).round_ties_even();
    let limit = MAX_PE_VALUE as f64;
    if scaled.is_nan() {
        warn!("PE coordinate {value} is not a number, encoded as 0");
        0
    } else if scaled.abs() > limit {
        warn!("PE coordinate {value} out of range, clamped");
        scaled.clamp(-limit, limit) as i64
    } else {
        scaled as i64
    }
}

fn encode_integer(buffer: &mut Vec<u8>, value: i64, base: PeBase) {
    // |value| <= 2 * MAX_PE_VALUE, the shift keeps every bit
    let magnitude = value.unsigned_abs() << 1;
    let mut x = if value >= 0 { magnitude } else { magnitude | 1 };
    let radix = base.radix();
    while x >= radix {
        buffer.push(DIGIT_OFFSET + (x % radix) as u8);
        x /= radix;
    }
    buffer.push(base.terminal_offset() + x as u8);
}

/// Encode `value` as PE number with `frac_bits` fractional bits.
///
/// Values are rounded half to even after scaling.
pub fn pe_encode(value: f64, frac_bits: u32, base: PeBase) -> Vec<u8> {
    let mut buffer = Vec::new();
    encode_integer(&mut buffer, quantize(value, frac_bits), base);
    buffer
}

/// Decode the PE number at the start of `data`.
///
/// Returns the value and the count of consumed bytes.
pub fn pe_decode(data: &[u8], frac_bits: u32, base: PeBase) -> Result<(f64, usize)> {
    let radix = base.radix();
    let mut value: u64 = 0;
    let mut factor: u64 = 1;
    for (offset, &byte) in data.iter().enumerate() {
        let (digit, is_terminal) = base
            .digit(byte)
            .ok_or(DecodeError::InvalidDigit { byte, offset })?;
        value = digit
            .checked_mul(factor)
            .and_then(|d| value.checked_add(d))
            .ok_or(DecodeError::Overflow)?;
        if is_terminal {
            let magnitude = i64::try_from(value >> 1).map_err(|_| DecodeError::Overflow)?;
            let signed = if value & 1 == 1 { -magnitude } else { magnitude };
            return Ok((signed as f64 / fixed_point_scale(frac_bits), offset + 1));
        }
        factor = factor.checked_mul(radix).ok_or(DecodeError::Overflow)?;
    }
    Err(DecodeError::UnexpectedEnd)
}

/// Encode `vertices` as a single `PE` command.
///
/// The first vertex is an absolute pen up move, the remaining vertices
/// are relative pen down moves. Deltas are taken between quantized
/// vertices, rounding errors do not accumulate along the polyline. No
/// vertices give an empty command.
pub fn polyline_encoder(vertices: &[Point2], frac_bits: u32, base: PeBase) -> Vec<u8> {
    let Some(first) = vertices.first() else {
        return Vec::new();
    };
    let mut buffer = base.header().to_vec();
    if frac_bits > 0 {
        buffer.push(FLAG_FRACTIONAL_BITS);
        encode_integer(&mut buffer, i64::from(frac_bits), base);
    }
    buffer.push(FLAG_PEN_UP);
    buffer.push(FLAG_ABSOLUTE);

    let mut current = (quantize(first.x, frac_bits), quantize(first.y, frac_bits));
    encode_integer(&mut buffer, current.0, base);
    encode_integer(&mut buffer, current.1, base);
    for vertex in &vertices[1..] {
        let next = (quantize(vertex.x, frac_bits), quantize(vertex.y, frac_bits));
        encode_integer(&mut buffer, next.0 - current.0, base);
        encode_integer(&mut buffer, next.1 - current.1, base);
        current = next;
    }
    buffer.push(TERMINATOR);
    buffer
}

/// Round `value` to `decimal_places` and format it like `%g`, without a
/// trailing `.0` and without negative zero.
pub(crate) fn format_number(value: f64, decimal_places: u32) -> String {
    let factor = 10f64.powi(decimal_places as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{rounded}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    Line,
    Curve,
}

impl Run {
    fn command(self) -> &'static str {
        match self {
            Run::Line => "PR",
            Run::Curve => "BR",
        }
    }
}

/// Append `coords` to the open run of the same kind or start a new run.
fn append_run(data: &mut String, open: &mut Option<Run>, kind: Run, coords: &str) {
    if *open == Some(kind) {
        data.pop();
        data.push(',');
    } else {
        data.push_str(kind.command());
    }
    data.push_str(coords);
    data.push(';');
    *open = Some(kind);
}

/// Encode `path` as HPGL/2 commands with relative line (`PR`) and relative
/// cubic Bezier (`BR`) runs.
///
/// Quadratic segments are elevated to cubic segments. An empty path gives
/// an empty command.
pub fn path_encoder(path: &Path2d, decimal_places: u32) -> Vec<u8> {
    let Some(start) = path.start() else {
        return Vec::new();
    };
    let fmt = |v: f64| format_number(v, decimal_places);
    let mut data = format!("PU;PA{},{};PD;", fmt(start.x), fmt(start.y));
    let mut current = start;
    let mut open_run: Option<Run> = None;
    for element in path.commands() {
        let end: Vec2 = element.end() - current;
        let (xe, ye) = (fmt(end.x), fmt(end.y));
        match element {
            PathElement::MoveTo(target) => {
                data.push_str(&format!("PU;PA{},{};PD;", fmt(target.x), fmt(target.y)));
                open_run = None;
            }
            PathElement::LineTo(_) => {
                append_run(&mut data, &mut open_run, Run::Line, &format!("{xe},{ye}"));
            }
            PathElement::Curve3To { ctrl, .. } => {
                let ctrl = ctrl - current;
                let ctrl1 = ctrl * 2.0 / 3.0;
                let ctrl2 = end + (ctrl - end) * 2.0 / 3.0;
                let coords = format!(
                    "{},{},{},{},{xe},{ye}",
                    fmt(ctrl1.x),
                    fmt(ctrl1.y),
                    fmt(ctrl2.x),
                    fmt(ctrl2.y)
                );
                append_run(&mut data, &mut open_run, Run::Curve, &coords);
            }
            PathElement::Curve4To { ctrl1, ctrl2, .. } => {
                let ctrl1 = ctrl1 - current;
                let ctrl2 = ctrl2 - current;
                let coords = format!(
                    "{},{},{},{},{xe},{ye}",
                    fmt(ctrl1.x),
                    fmt(ctrl1.y),
                    fmt(ctrl2.x),
                    fmt(ctrl2.y)
                );
                append_run(&mut data, &mut open_run, Run::Curve, &coords);
            }
        }
        current = element.end();
    }
    data.push_str("PU;");
    data.into_bytes()
}

/// Decoder of `PE` commands into absolute polylines.
///
/// The pen position is kept across commands. A pen up move starts a new
/// polyline, pen down moves extend the last polyline.
#[derive(Debug, Clone, Default)]
pub struct PeDecoder {
    position: Point2,
    polylines: Vec<Vec<Point2>>,
}

impl PeDecoder {
    /// Decoder at the origin without polylines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode all `PE` commands of a plot file; other commands are
    /// skipped and do not move the pen.
    pub fn decode(data: &[u8]) -> Result<Vec<Vec<Point2>>> {
        let mut decoder = Self::new();
        decoder.decode_stream(data)?;
        Ok(decoder.into_polylines())
    }

    /// The current pen position.
    pub fn position(&self) -> Point2 {
        self.position
    }

    /// The decoded polylines.
    pub fn polylines(&self) -> &[Vec<Point2>] {
        &self.polylines
    }

    /// Consume the decoder and return the decoded polylines.
    pub fn into_polylines(self) -> Vec<Vec<Point2>> {
        self.polylines
    }

    /// Decode the `PE` commands of a command stream.
    pub fn decode_stream(&mut self, data: &[u8]) -> Result<()> {
        let mut pos = 0;
        while pos < data.len() {
            if data[pos..].starts_with(b"PE") {
                pos += self
                    .decode_command(&data[pos..])
                    .map_err(|err| shift_offset(err, pos))?;
            } else {
                match data[pos..].iter().position(|&b| b == TERMINATOR) {
                    Some(index) => pos += index + 1,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Decode a single `PE` command at the start of `data`.
    ///
    /// Returns the count of consumed bytes, the terminating `;` included.
    pub fn decode_command(&mut self, data: &[u8]) -> Result<usize> {
        if !data.starts_with(b"PE") {
            let prefix = &data[..data.len().min(8)];
            return Err(DecodeError::InvalidHeader(
                String::from_utf8_lossy(prefix).into_owned(),
            ));
        }
        let mut pos = 2;
        let mut base = PeBase::Base64;
        let mut frac_bits = 0;
        let mut pen_up = false;
        let mut absolute = false;
        loop {
            let Some(&byte) = data.get(pos) else {
                return Err(DecodeError::UnexpectedEnd);
            };
            match byte {
                TERMINATOR => return Ok(pos + 1),
                FLAG_SEVEN_BIT => {
                    base = PeBase::Base32;
                    pos += 1;
                }
                FLAG_FRACTIONAL_BITS => {
                    pos += 1;
                    let (value, count) = decode_at(data, pos, 0, base)?;
                    if value < 0.0 {
                        return Err(DecodeError::InvalidHeader(format!(
                            "negative fractional bits {value}"
                        )));
                    }
                    frac_bits = value as u32;
                    pos += count;
                }
                FLAG_PEN_UP => {
                    pen_up = true;
                    pos += 1;
                }
                FLAG_ABSOLUTE => {
                    absolute = true;
                    pos += 1;
                }
                _ => {
                    let (x, count) = decode_at(data, pos, frac_bits, base)?;
                    pos += count;
                    let (y, count) = decode_at(data, pos, frac_bits, base)?;
                    pos += count;
                    self.move_pen(x, y, pen_up, absolute);
                    pen_up = false;
                    absolute = false;
                }
            }
        }
    }

    fn move_pen(&mut self, x: f64, y: f64, pen_up: bool, absolute: bool) {
        let previous = self.position;
        self.position = if absolute {
            Point2::new(x, y)
        } else {
            previous + Vec2::new(x, y)
        };
        match self.polylines.last_mut() {
            Some(polyline) if !pen_up => polyline.push(self.position),
            _ if pen_up => self.polylines.push(vec![self.position]),
            _ => self.polylines.push(vec![previous, self.position]),
        }
    }
}

fn decode_at(data: &[u8], pos: usize, frac_bits: u32, base: PeBase) -> Result<(f64, usize)> {
    pe_decode(&data[pos..], frac_bits, base).map_err(|err| shift_offset(err, pos))
}

fn shift_offset(err: DecodeError, shift: usize) -> DecodeError {
    match err {
        DecodeError::InvalidDigit { byte, offset } => DecodeError::InvalidDigit {
            byte,
            offset: offset + shift,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn test_encode_known_values() {
        assert_eq!(pe_encode(0.0, 0, PeBase::Base64), vec![191]);
        assert_eq!(pe_encode(1.0, 0, PeBase::Base64), vec![193]);
        assert_eq!(pe_encode(-1.0, 0, PeBase::Base64), vec![194]);
        // 10525 -> 21050 = 58 + 8 * 64 + 5 * 64^2
        assert_eq!(pe_encode(10525.0, 0, PeBase::Base64), vec![63 + 58, 63 + 8, 191 + 5]);
        assert_eq!(pe_encode(1.0, 0, PeBase::Base32), vec![97]);
    }

    #[test]
    fn test_encode_rounds_half_to_even() {
        assert_eq!(pe_encode(2.5, 0, PeBase::Base64), pe_encode(2.0, 0, PeBase::Base64));
        assert_eq!(pe_encode(3.5, 0, PeBase::Base64), pe_encode(4.0, 0, PeBase::Base64));
    }

    #[test]
    fn test_decode_integers() {
        for base in [PeBase::Base32, PeBase::Base64] {
            for value in [0.0, 1.0, -1.0, 31.0, -32.0, 10525.0, -10525.0, 1e9] {
                let data = pe_encode(value, 0, base);
                let (decoded, count) = pe_decode(&data, 0, base).unwrap();
                assert_eq!(decoded, value);
                assert_eq!(count, data.len());
            }
        }
    }

    #[test]
    fn test_decode_fractional_bits() {
        let data = pe_encode(1.3, 7, PeBase::Base64);
        let (value, _) = pe_decode(&data, 7, PeBase::Base64).unwrap();
        assert_relative_eq!(value, 1.3, epsilon = 1.0 / 256.0);
        let data = pe_encode(-0.625, 3, PeBase::Base32);
        let (value, _) = pe_decode(&data, 3, PeBase::Base32).unwrap();
        assert_eq!(value, -0.625);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(pe_decode(&[63, 64], 0, PeBase::Base64), Err(DecodeError::UnexpectedEnd));
        assert_eq!(
            pe_decode(&[63, b';'], 0, PeBase::Base64),
            Err(DecodeError::InvalidDigit { byte: b';', offset: 1 })
        );
        // 191 is no digit in base 32
        assert!(pe_decode(&[191], 0, PeBase::Base32).is_err());
        assert_eq!(pe_decode(&[63; 16], 0, PeBase::Base64), Err(DecodeError::Overflow));
    }

    #[test_log::test]
    fn test_encode_clamps_out_of_range_values() {
        let limit = MAX_PE_VALUE as f64;
        for (value, expected) in [(f64::NAN, 0.0), (1e300, limit), (-1e300, -limit), (f64::INFINITY, limit)] {
            let data = pe_encode(value, 0, PeBase::Base64);
            let (decoded, count) = pe_decode(&data, 0, PeBase::Base64).unwrap();
            assert_eq!(decoded, expected);
            assert_eq!(count, data.len());
        }
        let data = pe_encode(limit, 0, PeBase::Base32);
        assert_eq!(pe_decode(&data, 0, PeBase::Base32).unwrap().0, limit);
    }

    #[test_log::test]
    fn test_polyline_with_huge_coordinates_keeps_signs() {
        let limit = MAX_PE_VALUE as f64;
        let vertices = [p(0.0, 0.0), p(1e20, -1e20), p(-1e20, 1e20)];
        let data = polyline_encoder(&vertices, 0, PeBase::Base64);
        let polylines = PeDecoder::decode(&data).unwrap();
        assert_eq!(polylines, vec![vec![p(0.0, 0.0), p(limit, -limit), p(-limit, limit)]]);
    }

    #[test]
    fn test_polyline_header() {
        let data = polyline_encoder(&[p(1.0, 2.0)], 0, PeBase::Base64);
        assert_eq!(&data[..4], b"PE<=");
        assert_eq!(data.last(), Some(&b';'));
        let data = polyline_encoder(&[p(1.0, 2.0)], 3, PeBase::Base32);
        assert_eq!(&data[..5], b"PE7>\x65");
        assert!(polyline_encoder(&[], 0, PeBase::Base64).is_empty());
    }

    #[test]
    fn test_polyline_decodes_to_absolute_vertices() {
        let vertices = [p(10.0, 20.0), p(30.0, 20.0), p(30.0, -5.0), p(10.0, 20.0)];
        for base in [PeBase::Base32, PeBase::Base64] {
            let data = polyline_encoder(&vertices, 0, base);
            let polylines = PeDecoder::decode(&data).unwrap();
            assert_eq!(polylines, vec![vertices.to_vec()]);
        }
    }

    #[test]
    fn test_polyline_deltas_do_not_drift() {
        let vertices: Vec<Point2> = (0..100).map(|i| p(i as f64 * 0.3, 0.0)).collect();
        let data = polyline_encoder(&vertices, 0, PeBase::Base64);
        let polylines = PeDecoder::decode(&data).unwrap();
        let last = polylines[0].last().copied().unwrap();
        assert_eq!(last.x, (99.0f64 * 0.3).round());
    }

    #[test]
    fn test_decode_stream_skips_other_commands() {
        let mut data = b"IN;SP1;PW0.25;".to_vec();
        data.extend(polyline_encoder(&[p(0.0, 0.0), p(5.0, 0.0)], 2, PeBase::Base64));
        data.extend_from_slice(b"PU;PA0,0;");
        data.extend(polyline_encoder(&[p(1.25, 1.0), p(1.25, 3.5)], 2, PeBase::Base64));
        let polylines = PeDecoder::decode(&data).unwrap();
        assert_eq!(polylines.len(), 2);
        assert_eq!(polylines[1], vec![p(1.25, 1.0), p(1.25, 3.5)]);
    }

    #[test]
    fn test_decode_command_errors() {
        let mut decoder = PeDecoder::new();
        assert!(matches!(
            decoder.decode_command(b"PA0,0;"),
            Err(DecodeError::InvalidHeader(_))
        ));
        assert_eq!(decoder.decode_command(b"PE<=\xbf"), Err(DecodeError::UnexpectedEnd));
        assert_eq!(
            decoder.decode_command(b"PE<=\xbf\x01;"),
            Err(DecodeError::InvalidDigit { byte: 1, offset: 5 })
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12.0, 1), "12");
        assert_eq!(format_number(12.34, 1), "12.3");
        assert_eq!(format_number(-0.04, 1), "0");
        assert_eq!(format_number(2.6, 0), "3");
    }

    #[test]
    fn test_path_encoder_lines() {
        let path = Path2d::from_vertices([p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0)], false);
        let data = path_encoder(&path, 1);
        assert_eq!(String::from_utf8(data).unwrap(), "PU;PA0,0;PD;PR10,0,0,10;PU;");
    }

    #[test]
    fn test_path_encoder_curves() {
        let mut path = Path2d::new(p(0.0, 0.0));
        path.curve4_to(p(30.0, 0.0), p(10.0, 10.0), p(20.0, 10.0));
        path.curve3_to(p(60.0, 0.0), p(45.0, 15.0));
        path.line_to(p(60.0, -10.0));
        let data = String::from_utf8(path_encoder(&path, 1)).unwrap();
        assert_eq!(
            data,
            "PU;PA0,0;PD;BR10,10,20,10,30,0,10,10,20,10,30,0;PR0,-10;PU;"
        );
    }

    #[test]
    fn test_path_encoder_empty() {
        assert!(path_encoder(&Path2d::default(), 1).is_empty());
    }
}
