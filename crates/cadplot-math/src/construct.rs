//! 2D construction helpers: orientation, containment and intersection tests.

use crate::{Point2, Tolerance};

/// Returns `true` if `a` and `b` are close, combining a relative tolerance
/// of 1e-9 with the absolute tolerance `abs_tol`.
pub fn is_close(a: &Point2, b: &Point2, abs_tol: f64) -> bool {
    fn close(a: f64, b: f64, abs_tol: f64) -> bool {
        let rel = Tolerance::DEFAULT.relative * a.abs().max(b.abs());
        (a - b).abs() <= rel.max(abs_tol)
    }
    close(a.x, b.x, abs_tol) && close(a.y, b.y, abs_tol)
}

/// Relation of a point to a directed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonRelation {
    /// Left of the line, or inside the polygon.
    Inside,
    /// On the line, or on the polygon boundary.
    Boundary,
    /// Right of the line, or outside the polygon.
    Outside,
}

/// Returns `-1` if `point` is left of the line `start -> end`, `+1` if
/// right of it and `0` if on the line.
pub fn point_to_line_relation(point: &Point2, start: &Point2, end: &Point2, abs_tol: f64) -> i32 {
    let rel = (end.x - start.x) * (point.y - start.y) - (end.y - start.y) * (point.x - start.x);
    if rel.abs() <= abs_tol {
        0
    } else if rel < 0.0 {
        1
    } else {
        -1
    }
}

/// Intersection point of two lines.
///
/// With `virtual_ = true` the lines are treated as infinite, otherwise the
/// intersection must lie on both segments (end points included).
/// Returns `None` for parallel lines.
pub fn intersection_line_line_2d(
    line1: (&Point2, &Point2),
    line2: (&Point2, &Point2),
    virtual_: bool,
    abs_tol: f64,
) -> Option<Point2> {
    let (s1, s2) = line1;
    let (c1, c2) = line2;
    let den = (c2.y - c1.y) * (s2.x - s1.x) - (c2.x - c1.x) * (s2.y - s1.y);
    if den.abs() <= abs_tol {
        return None;
    }
    let us = ((c2.x - c1.x) * (s1.y - c1.y) - (c2.y - c1.y) * (s1.x - c1.x)) / den;
    let ip = Point2::new(s1.x + us * (s2.x - s1.x), s1.y + us * (s2.y - s1.y));
    if virtual_ {
        return Some(ip);
    }
    if (0.0..=1.0).contains(&us) {
        let uc = ((s2.x - s1.x) * (s1.y - c1.y) - (s2.y - s1.y) * (s1.x - c1.x)) / den;
        if (0.0..=1.0).contains(&uc) {
            return Some(ip);
        }
    }
    None
}

/// Point-in-polygon test for convex and concave polygons of either
/// orientation. Degenerate polygons report every point as outside.
pub fn is_point_in_polygon_2d(point: &Point2, polygon: &[Point2], abs_tol: f64) -> PolygonRelation {
    let mut polygon = polygon;
    if polygon.len() < 3 {
        return PolygonRelation::Outside;
    }
    if is_close(&polygon[0], &polygon[polygon.len() - 1], Tolerance::VERTEX.linear) {
        polygon = &polygon[..polygon.len() - 1];
    }
    if polygon.len() < 3 {
        return PolygonRelation::Outside;
    }
    let (x, y) = (point.x, point.y);
    let mut inside = false;
    let last = polygon[polygon.len() - 1];
    let (mut x1, mut y1) = (last.x, last.y);
    for p in polygon {
        let (x2, y2) = (p.x, p.y);
        let (a, b) = if x2 < x1 { (x2, x1) } else { (x1, x2) };
        if a <= x && x <= b {
            let (c, d) = if y2 < y1 { (y2, y1) } else { (y1, y2) };
            if c <= y && y <= d && ((y2 - y1) * x - (x2 - x1) * y + (x2 * y1 - y2 * x1)).abs() <= abs_tol
            {
                return PolygonRelation::Boundary;
            }
        }
        if ((y1 <= y && y < y2) || (y2 <= y && y < y1)) && x < (x2 - x1) * (y - y1) / (y2 - y1) + x1 {
            inside = !inside;
        }
        x1 = x2;
        y1 = y2;
    }
    if inside {
        PolygonRelation::Inside
    } else {
        PolygonRelation::Outside
    }
}

/// Returns `true` if the polygon has clockwise orientation, `false` for
/// counter-clockwise and for polygons with less than 3 vertices.
pub fn has_clockwise_orientation(vertices: &[Point2]) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut sum = 0.0;
    for pair in vertices.windows(2) {
        sum += (pair[1].x - pair[0].x) * (pair[1].y + pair[0].y);
    }
    let first = vertices[0];
    let last = vertices[vertices.len() - 1];
    if !is_close(&first, &last, Tolerance::VERTEX.linear) {
        sum += (first.x - last.x) * (first.y + last.y);
    }
    sum > 0.0
}

/// Signed-free polygon area (shoelace formula); open or closed input.
pub fn area(vertices: &[Point2]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let n = vertices.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    (sum / 2.0).abs()
}

/// Returns `true` if the polygon is convex. Coincident vertices are
/// skipped; with `strict = true` collinear vertices are not convex.
pub fn is_convex_polygon_2d(polygon: &[Point2], strict: bool, epsilon: f64) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut global_sign = 0i32;
    let mut prev = polygon[polygon.len() - 1];
    let mut prev_prev = polygon[polygon.len() - 2];
    for vertex in polygon {
        if is_close(vertex, &prev, Tolerance::VERTEX.linear) {
            continue;
        }
        let a = prev - vertex;
        let b = prev_prev - prev;
        let det = a.x * b.y - a.y * b.x;
        if det.abs() >= epsilon {
            let current_sign = if det < 0.0 { -1 } else { 1 };
            if global_sign == 0 {
                global_sign = current_sign;
            }
            if global_sign != current_sign {
                return false;
            }
        } else if strict {
            return false;
        }
        prev_prev = prev;
        prev = *vertex;
    }
    global_sign != 0
}

/// Returns `true` if the 4 (or closed 5) points form a rectangle with
/// sides parallel to the coordinate axes.
pub fn is_axes_aligned_rectangle_2d(points: &[Point2]) -> bool {
    if points.is_empty() {
        return false;
    }
    let mut count = points.len();
    if is_close(&points[0], &points[count - 1], Tolerance::VERTEX.linear) {
        count -= 1;
    }
    if count != 4 {
        return false;
    }
    let same = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs());
    let horizontal = |a: &Point2, b: &Point2| same(a.y, b.y);
    let vertical = |a: &Point2, b: &Point2| same(a.x, b.x);
    let (p0, p1, p2, p3) = (&points[0], &points[1], &points[2], &points[3]);
    (horizontal(p0, p1) && vertical(p1, p2) && horizontal(p2, p3) && vertical(p3, p0))
        || (vertical(p0, p1) && horizontal(p1, p2) && vertical(p2, p3) && horizontal(p3, p0))
}
