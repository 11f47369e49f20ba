//! Dash expansion of styled lines.

use cadplot_math::{is_close, Point2};

/// Patterns up to this total length draw solid lines.
pub const MIN_PATTERN_LENGTH: f64 = 1e-12;

/// Splits lines into dash segments by an on-off pattern.
///
/// The pattern phase carries over from one segment to the next, so the
/// segments of a polyline are dashed as one continuous line.
#[derive(Debug, Clone)]
pub struct DashRenderer<'a> {
    dashes: &'a [f64],
    current: usize,
    remaining: f64,
    is_dash: bool,
}

impl<'a> DashRenderer<'a> {
    /// Renderer for alternating dash and gap lengths; less than two
    /// entries or a pattern without positive length draw solid lines.
    pub fn new(dashes: &'a [f64]) -> Self {
        Self {
            dashes,
            current: 0,
            remaining: dashes.first().copied().unwrap_or(0.0),
            is_dash: true,
        }
    }

    /// Returns `true` if the pattern draws solid lines.
    pub fn is_solid(&self) -> bool {
        self.dashes.len() < 2 || self.dashes.iter().sum::<f64>() <= MIN_PATTERN_LENGTH
    }

    /// Dash segments of the line `start -> end`.
    pub fn line_segment(&mut self, start: Point2, end: Point2) -> Vec<(Point2, Point2)> {
        if self.is_solid() || is_close(&start, &end, 1e-12) {
            return vec![(start, end)];
        }
        let v = end - start;
        let dir = v / v.norm();
        let mut runs = Vec::new();
        self.render_dashes(v.norm(), &mut runs);
        let mut segments = Vec::with_capacity(runs.len() / 2 + 1);
        let mut start = start;
        for (is_dash, length) in runs {
            let end = start + dir * length;
            if is_dash {
                segments.push((start, end));
            }
            start = end;
        }
        segments
    }

    /// Dash segments of the polyline `vertices`.
    pub fn line_segments(&mut self, vertices: impl IntoIterator<Item = Point2>) -> Vec<(Point2, Point2)> {
        let mut segments = Vec::new();
        let mut last: Option<Point2> = None;
        for vertex in vertices {
            if let Some(prev) = last {
                segments.extend(self.line_segment(prev, vertex));
            }
            last = Some(vertex);
        }
        segments
    }

    fn render_dashes(&mut self, mut length: f64, runs: &mut Vec<(bool, f64)>) {
        loop {
            if length <= self.remaining {
                self.remaining -= length;
                runs.push((self.is_dash, length));
                if self.remaining.abs() < 1e-12 {
                    self.cycle();
                }
                return;
            }
            length -= self.remaining;
            runs.push((self.is_dash, self.remaining));
            self.cycle();
        }
    }

    fn cycle(&mut self) {
        self.current = (self.current + 1) % self.dashes.len();
        self.remaining = self.dashes[self.current];
        self.is_dash = !self.is_dash;
    }
}
