//! Line clipping against axis-aligned rectangles.

use cadplot_math::{is_close, Point2};

const LEFT: u8 = 0x1;
const RIGHT: u8 = 0x2;
const BOTTOM: u8 = 0x4;
const TOP: u8 = 0x8;

/// Cohen-Sutherland line clipping against the window `w_min`..`w_max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohenSutherland {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl CohenSutherland {
    /// Create from the bottom-left and top-right window corners.
    pub fn new(w_min: Point2, w_max: Point2) -> Self {
        Self {
            x_min: w_min.x,
            y_min: w_min.y,
            x_max: w_max.x,
            y_max: w_max.y,
        }
    }

    fn encode(&self, x: f64, y: f64) -> u8 {
        let mut code = 0;
        if x < self.x_min {
            code |= LEFT;
        } else if x > self.x_max {
            code |= RIGHT;
        }
        if y < self.y_min {
            code |= BOTTOM;
        } else if y > self.y_max {
            code |= TOP;
        }
        code
    }

    /// Returns the visible part of the line `p0 -> p1`, if any.
    pub fn clip_line(&self, p0: Point2, p1: Point2) -> Option<(Point2, Point2)> {
        let (mut x0, mut y0) = (p0.x, p0.y);
        let (mut x1, mut y1) = (p1.x, p1.y);
        let mut code0 = self.encode(x0, y0);
        let mut code1 = self.encode(x1, y1);
        loop {
            if code0 | code1 == 0 {
                return Some((Point2::new(x0, y0), Point2::new(x1, y1)));
            }
            if code0 & code1 != 0 {
                return None;
            }
            // at least one end point is outside, start with the larger code
            let code = code0.max(code1);
            let (x, y) = if code & TOP != 0 {
                (x0 + (x1 - x0) * (self.y_max - y0) / (y1 - y0), self.y_max)
            } else if code & BOTTOM != 0 {
                (x0 + (x1 - x0) * (self.y_min - y0) / (y1 - y0), self.y_min)
            } else if code & RIGHT != 0 {
                (self.x_max, y0 + (y1 - y0) * (self.x_max - x0) / (x1 - x0))
            } else {
                (self.x_min, y0 + (y1 - y0) * (self.x_min - x0) / (x1 - x0))
            };
            if code == code0 {
                x0 = x;
                y0 = y;
                code0 = self.encode(x0, y0);
            } else {
                x1 = x;
                y1 = y;
                code1 = self.encode(x1, y1);
            }
        }
    }
}

/// Clip a polyline segment by segment with `clip_line` and merge
/// contiguous clipped segments back into polylines.
pub fn clip_polyline_with<F>(polyline: &[Point2], abs_tol: f64, mut clip_line: F) -> Vec<Vec<Point2>>
where
    F: FnMut(Point2, Point2) -> Vec<(Point2, Point2)>,
{
    let mut parts: Vec<Vec<Point2>> = Vec::new();
    if polyline.len() < 2 {
        return parts;
    }
    let mut current: Vec<Point2> = Vec::new();
    for pair in polyline.windows(2) {
        for (start, end) in clip_line(pair[0], pair[1]) {
            if let Some(last) = current.last() {
                if is_close(last, &start, abs_tol) {
                    current.push(end);
                    continue;
                }
                parts.push(std::mem::take(&mut current));
            }
            current = vec![start, end];
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
