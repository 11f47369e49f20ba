//! Polygon clippers: convex, axis-aligned rectangle, concave and inverted.
//!
//! All clippers treat the clipping polygon as closed. Lines and polylines
//! are split into visible parts; polygons are clipped into closed parts.

use cadplot_math::{
    has_clockwise_orientation, intersection_line_line_2d, is_close, is_point_in_polygon_2d,
    point_to_line_relation, BoundingBox2d, Point2, PolygonRelation,
};

use crate::greiner_hormann;
use crate::lines::{clip_polyline_with, CohenSutherland};
use crate::{ClipError, Result, TOLERANCE};

/// Common interface of the clipping algorithms.
pub trait Clipper {
    /// Returns the visible parts of the line `start -> end`.
    fn clip_line(&self, start: Point2, end: Point2) -> Vec<(Point2, Point2)>;

    /// Returns the visible parts of an open polyline.
    fn clip_polyline(&self, polyline: &[Point2]) -> Vec<Vec<Point2>> {
        clip_polyline_with(polyline, TOLERANCE, |s, e| self.clip_line(s, e))
    }

    /// Returns the visible parts of a closed polygon.
    fn clip_polygon(&self, polygon: &[Point2]) -> Vec<Vec<Point2>>;

    /// Returns `true` if `point` is inside the clipping region, the
    /// boundary is inside.
    fn is_inside(&self, point: &Point2) -> bool;
}

/// Drop a closing vertex coincident with the first vertex.
fn open_polygon(vertices: &[Point2], abs_tol: f64) -> Vec<Point2> {
    let mut polygon = vertices.to_vec();
    if polygon.len() > 1 && is_close(&polygon[0], &polygon[polygon.len() - 1], abs_tol) {
        polygon.pop();
    }
    polygon
}

fn inside_or_boundary(point: &Point2, polygon: &[Point2], abs_tol: f64) -> bool {
    is_point_in_polygon_2d(point, polygon, abs_tol) != PolygonRelation::Outside
}

/// Clipping by an arbitrary convex polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexClipper {
    polygon: Vec<Point2>,
    abs_tol: f64,
}

impl ConvexClipper {
    /// Create from the vertices of a convex polygon of either orientation.
    pub fn new(vertices: &[Point2]) -> Result<Self> {
        let mut polygon = open_polygon(vertices, TOLERANCE);
        if polygon.len() < 3 {
            return Err(ClipError::InvalidGeometry(
                "clipping polygon requires at least 3 vertices".into(),
            ));
        }
        if has_clockwise_orientation(&polygon) {
            polygon.reverse();
        }
        Ok(Self {
            polygon,
            abs_tol: TOLERANCE,
        })
    }

    /// Counter-clockwise clipping polygon vertices.
    pub fn vertices(&self) -> &[Point2] {
        &self.polygon
    }

    /// Iterate the clipping edges of the closed polygon.
    fn edges(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        let last = self.polygon[self.polygon.len() - 1];
        std::iter::once(last)
            .chain(self.polygon.iter().copied())
            .zip(self.polygon.iter().copied())
    }
}

/// Left-of-edge test, `>= 0` includes the edge itself.
fn cross(clip_start: &Point2, clip_end: &Point2, point: &Point2) -> f64 {
    (clip_end.x - clip_start.x) * (point.y - clip_start.y)
        - (clip_end.y - clip_start.y) * (point.x - clip_start.x)
}

impl Clipper for ConvexClipper {
    fn clip_line(&self, start: Point2, end: Point2) -> Vec<(Point2, Point2)> {
        let mut edge_start = start;
        let mut edge_end = end;
        for (clip_start, clip_end) in self.edges() {
            let is_inside = |p: &Point2| cross(&clip_start, &clip_end, p) >= 0.0;
            let intersection = |default: Point2, s: &Point2, e: &Point2| {
                intersection_line_line_2d((s, e), (&clip_start, &clip_end), true, self.abs_tol)
                    .unwrap_or(default)
            };
            if is_inside(&edge_start) {
                if !is_inside(&edge_end) {
                    edge_end = intersection(edge_end, &edge_start, &edge_end);
                }
            } else if is_inside(&edge_end) {
                edge_start = intersection(edge_start, &edge_start, &edge_end);
            } else {
                return Vec::new();
            }
        }
        vec![(edge_start, edge_end)]
    }

    /// Sutherland-Hodgman; always returns a single, possibly empty, polygon.
    fn clip_polygon(&self, polygon: &[Point2]) -> Vec<Vec<Point2>> {
        let mut clipped: Vec<Point2> = polygon.to_vec();
        for (clip_start, clip_end) in self.edges() {
            if clipped.is_empty() {
                break;
            }
            let is_inside = |p: &Point2| cross(&clip_start, &clip_end, p) > 0.0;
            let vertices = open_polygon(&clipped, self.abs_tol);
            clipped.clear();
            let mut edge_start = vertices[vertices.len() - 1];
            for edge_end in vertices {
                let ip = || {
                    intersection_line_line_2d(
                        (&edge_start, &edge_end),
                        (&clip_start, &clip_end),
                        true,
                        self.abs_tol,
                    )
                };
                if is_inside(&edge_end) {
                    if !is_inside(&edge_start) {
                        clipped.extend(ip());
                    }
                    clipped.push(edge_end);
                } else if is_inside(&edge_start) {
                    clipped.extend(ip());
                }
                edge_start = edge_end;
            }
        }
        vec![clipped]
    }

    fn is_inside(&self, point: &Point2) -> bool {
        inside_or_boundary(point, &self.polygon, self.abs_tol)
    }
}

/// Clipping by a rectangle with edges parallel to the coordinate axes.
#[derive(Debug, Clone, PartialEq)]
pub struct RectClipper {
    bbox: BoundingBox2d,
    polygon: ConvexClipper,
    lines: CohenSutherland,
}

impl RectClipper {
    /// Create from two opposite corners.
    pub fn new(p1: Point2, p2: Point2) -> Self {
        let bbox = BoundingBox2d::new(p1, p2);
        let (bl, tr) = (bbox.extmin, bbox.extmax);
        // four distinct counter-clockwise vertices, no orientation check needed
        let polygon = ConvexClipper {
            polygon: vec![bl, Point2::new(tr.x, bl.y), tr, Point2::new(bl.x, tr.y)],
            abs_tol: TOLERANCE,
        };
        Self {
            bbox,
            polygon,
            lines: CohenSutherland::new(bl, tr),
        }
    }

    /// The clipping rectangle.
    pub fn bbox(&self) -> &BoundingBox2d {
        &self.bbox
    }
}

impl Clipper for RectClipper {
    fn clip_line(&self, start: Point2, end: Point2) -> Vec<(Point2, Point2)> {
        self.lines.clip_line(start, end).into_iter().collect()
    }

    fn clip_polygon(&self, polygon: &[Point2]) -> Vec<Vec<Point2>> {
        self.polygon.clip_polygon(polygon)
    }

    fn is_inside(&self, point: &Point2) -> bool {
        self.bbox.inside(point)
    }
}

/// Clipping by an arbitrary, possibly concave, polygon.
///
/// Also represents inverted clipping, see [`ConcaveClipper::inverted`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConcaveClipper {
    polygon: Vec<Point2>,
    bbox: BoundingBox2d,
    abs_tol: f64,
}

impl ConcaveClipper {
    /// Create from the vertices of an arbitrary polygon of either orientation.
    pub fn new(vertices: &[Point2]) -> Result<Self> {
        let polygon = open_polygon(vertices, TOLERANCE);
        if polygon.len() < 3 {
            return Err(ClipError::InvalidGeometry(
                "clipping polygon requires at least 3 vertices".into(),
            ));
        }
        let bbox = BoundingBox2d::from_points(polygon.iter());
        Ok(Self {
            polygon,
            bbox,
            abs_tol: TOLERANCE,
        })
    }

    /// Create an inverted clipper: everything between `inner` and the
    /// rectangle `outer_bounds` is inside.
    ///
    /// The outer bounds must be larger than the content to clip.
    pub fn inverted(inner: &[Point2], outer_bounds: BoundingBox2d) -> Result<Self> {
        let mut clip = inner.to_vec();
        if clip.len() > 1 && !is_close(&clip[0], &clip[clip.len() - 1], TOLERANCE) {
            clip.push(clip[0]);
        }
        if clip.len() < 4 {
            return Err(ClipError::InvalidGeometry(
                "inner clipping polygon requires at least 3 vertices".into(),
            ));
        }
        let polygon = make_inverted_clipping_polygon(&clip, &outer_bounds, TOLERANCE)?;
        Ok(Self {
            polygon,
            bbox: outer_bounds,
            abs_tol: TOLERANCE,
        })
    }

    /// Clipping polygon vertices.
    pub fn vertices(&self) -> &[Point2] {
        &self.polygon
    }
}

impl Clipper for ConcaveClipper {
    fn clip_line(&self, start: Point2, end: Point2) -> Vec<(Point2, Point2)> {
        let abs_tol = self.abs_tol;
        if !self.bbox.has_overlap(&BoundingBox2d::new(start, end)) {
            return Vec::new();
        }
        let mut intersections = polygon_line_intersections_2d(&self.polygon, (start, end), abs_tol);
        let start_is_inside = inside_or_boundary(&start, &self.polygon, TOLERANCE);
        if intersections.is_empty() {
            if start_is_inside {
                return vec![(start, end)];
            }
            return Vec::new();
        }
        let end_is_inside = inside_or_boundary(&end, &self.polygon, abs_tol);
        if end_is_inside && intersections.last().is_some_and(|ip| !is_close(ip, &end, abs_tol)) {
            intersections.push(end);
        }
        if start_is_inside && !is_close(&intersections[0], &start, abs_tol) {
            intersections.insert(0, start);
        }

        // Duplicates at both ends come from hitting the connection point of
        // two edges. Duplicates in between come from the coincident edges of
        // inverted clipping polygons and are required by the inside/outside rule.
        if intersections.len() > 1 && is_close(&intersections[0], &intersections[1], abs_tol) {
            intersections.remove(0);
        }
        let n = intersections.len();
        if n > 1 && is_close(&intersections[n - 1], &intersections[n - 2], abs_tol) {
            intersections.pop();
        }

        if has_collinear_edge(&self.polygon, start, end) {
            // segments collinear with an edge are inside, test each midpoint
            return intersections
                .windows(2)
                .filter(|pair| !is_close(&pair[0], &pair[1], abs_tol))
                .filter(|pair| {
                    let mid = pair[0] + (pair[1] - pair[0]) * 0.5;
                    inside_or_boundary(&mid, &self.polygon, abs_tol)
                })
                .map(|pair| (pair[0], pair[1]))
                .collect();
        }

        // inside/outside rule: (0, 1) outside (2, 3) outside (4, 5) ...
        intersections
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    fn clip_polyline(&self, polyline: &[Point2]) -> Vec<Vec<Point2>> {
        let mut segments: Vec<Vec<Point2>> = Vec::new();
        for pair in polyline.windows(2) {
            for (a, b) in self.clip_line(pair[0], pair[1]) {
                if let Some(last_seg) = segments.last_mut() {
                    if last_seg.last().is_some_and(|p| is_close(p, &a, self.abs_tol)) {
                        last_seg.push(b);
                        continue;
                    }
                }
                segments.push(vec![a, b]);
            }
        }
        segments
    }

    fn clip_polygon(&self, polygon: &[Point2]) -> Vec<Vec<Point2>> {
        let vertices = open_polygon(polygon, self.abs_tol);
        if vertices.len() < 3 {
            return Vec::new();
        }
        let polygon_box = BoundingBox2d::from_points(vertices.iter());
        if !self.bbox.has_intersection(&polygon_box) {
            return Vec::new();
        }
        // Caching the clipper rings is not possible, both rings get modified.
        let result = greiner_hormann::intersection(&self.polygon, &vertices);
        if result.is_empty() {
            let is_outside = vertices
                .iter()
                .any(|v| !inside_or_boundary(v, &self.polygon, self.abs_tol));
            if is_outside {
                return Vec::new();
            }
            return vec![vertices];
        }
        result
    }

    fn is_inside(&self, point: &Point2) -> bool {
        self.bbox.inside(point) && inside_or_boundary(point, &self.polygon, self.abs_tol)
    }
}

/// Returns `true` if `polygon` has an edge collinear to the line `start -> end`.
pub fn has_collinear_edge(polygon: &[Point2], start: Point2, end: Point2) -> bool {
    let Some(last) = polygon.last() else {
        return false;
    };
    let mut rel_a = point_to_line_relation(last, &start, &end, TOLERANCE);
    for b in polygon {
        let rel_b = point_to_line_relation(b, &start, &end, TOLERANCE);
        if rel_a == 0 && rel_b == 0 {
            return true;
        }
        rel_a = rel_b;
    }
    false
}

/// All intersections of the closed `polygon` with `line`, sorted by the
/// distance from the line start.
///
/// Touching a polygon vertex without crossing is not an intersection.
/// Crossing at a vertex yields duplicate points, coincident edges are
/// kept as they are.
pub fn polygon_line_intersections_2d(
    polygon: &[Point2],
    line: (Point2, Point2),
    abs_tol: f64,
) -> Vec<Point2> {
    let (start, end) = line;
    let size = polygon.len();
    let mut points = Vec::new();
    for index in 0..size {
        let a = polygon[(index + size - 1) % size];
        let b = polygon[index];
        let Some(ip) = intersection_line_line_2d((&a, &b), (&start, &end), false, abs_tol) else {
            continue;
        };
        if is_close(&ip, &a, abs_tol) {
            let a_prev = polygon[(index + 2 * size - 2) % size];
            let rel_prev = point_to_line_relation(&a_prev, &start, &end, abs_tol);
            let rel_next = point_to_line_relation(&b, &start, &end, abs_tol);
            if rel_prev == rel_next {
                continue;
            }
        } else if is_close(&ip, &b, abs_tol) {
            let b_next = polygon[(index + 1) % size];
            let rel_prev = point_to_line_relation(&a, &start, &end, abs_tol);
            let rel_next = point_to_line_relation(&b_next, &start, &end, abs_tol);
            if rel_prev == rel_next {
                continue;
            }
        }
        points.push(ip);
    }
    points.sort_by(|p, q| {
        let dp = (p - start).norm();
        let dq = (q - start).norm();
        dp.total_cmp(&dq)
    });
    points
}

/// Connect `inner` with the clockwise `outer_bounds` rectangle at their
/// closest vertices; the result is a closed polygon.
pub fn make_inverted_clipping_polygon(
    inner: &[Point2],
    outer_bounds: &BoundingBox2d,
    abs_tol: f64,
) -> Result<Vec<Point2>> {
    let Some(mut outer_rect) = outer_bounds.rect_vertices().map(|r| r.to_vec()) else {
        return Err(ClipError::InvalidGeometry("outer bounds have no data".into()));
    };
    let inner = open_polygon(inner, abs_tol);
    if inner.len() < 3 {
        return Err(ClipError::InvalidGeometry(
            "inner clipping polygon requires at least 3 vertices".into(),
        ));
    }
    outer_rect.reverse();
    let (ci, co) = find_closest_vertices(&inner, &outer_rect);
    let mut result: Vec<Point2> = inner[ci..].to_vec();
    result.extend_from_slice(&inner[..=ci]);
    result.extend_from_slice(&outer_rect[co..]);
    result.extend_from_slice(&outer_rect[..=co]);
    result.push(result[0]);
    Ok(result)
}

/// Indices of the closest vertex pair of both lists.
pub fn find_closest_vertices(vertices0: &[Point2], vertices1: &[Point2]) -> (usize, usize) {
    let mut min_dist = f64::INFINITY;
    let mut result = (0, 0);
    for (i0, v0) in vertices0.iter().enumerate() {
        for (i1, v1) in vertices1.iter().enumerate() {
            let distance = (v0 - v1).norm();
            if distance < min_dist {
                min_dist = distance;
                result = (i0, i1);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadplot_math::area;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    fn l_shape() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 4.0),
            Point2::new(0.0, 4.0),
        ]
    }

    #[test]
    fn test_convex_requires_three_vertices() {
        let result = ConvexClipper::new(&[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
        assert!(matches!(result, Err(ClipError::InvalidGeometry(_))));
    }

    #[test]
    fn test_convex_clip_line() {
        let mut poly = square(0.0, 0.0, 10.0, 10.0);
        poly.reverse(); // clockwise input is reoriented
        let clipper = ConvexClipper::new(&poly).unwrap();
        let lines = clipper.clip_line(Point2::new(-5.0, 5.0), Point2::new(5.0, 5.0));
        assert_eq!(lines.len(), 1);
        assert!((lines[0].0 - Point2::new(0.0, 5.0)).norm() < 1e-12);
        assert_eq!(lines[0].1, Point2::new(5.0, 5.0));
        assert!(clipper
            .clip_line(Point2::new(-5.0, 20.0), Point2::new(5.0, 20.0))
            .is_empty());
    }

    #[test]
    fn test_convex_clip_polygon() {
        let clipper = ConvexClipper::new(&square(0.0, 0.0, 2.0, 2.0)).unwrap();
        let parts = clipper.clip_polygon(&square(1.0, 1.0, 3.0, 3.0));
        assert_eq!(parts.len(), 1);
        assert!((area(&parts[0]) - 1.0).abs() < 1e-9);
        let outside = clipper.clip_polygon(&square(5.0, 5.0, 6.0, 6.0));
        assert_eq!(outside, vec![Vec::<Point2>::new()]);
    }

    #[test]
    fn test_rect_clipper() {
        let clipper = RectClipper::new(Point2::new(10.0, 10.0), Point2::new(0.0, 0.0));
        assert!(clipper.is_inside(&Point2::new(10.0, 0.0)));
        let polylines = clipper.clip_polyline(&[
            Point2::new(-1.0, 1.0),
            Point2::new(5.0, 1.0),
            Point2::new(5.0, 5.0),
        ]);
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].len(), 3);
        assert_eq!(polylines[0][0], Point2::new(0.0, 1.0));
    }

    #[test]
    fn test_concave_clip_line_splits_at_notch() {
        let clipper = ConcaveClipper::new(&l_shape()).unwrap();
        // horizontal line through both arms of the L at y=3 only hits the upper arm
        let lines = clipper.clip_line(Point2::new(-1.0, 3.0), Point2::new(5.0, 3.0));
        assert_eq!(lines.len(), 1);
        assert!((lines[0].0 - Point2::new(0.0, 3.0)).norm() < 1e-9);
        assert!((lines[0].1 - Point2::new(2.0, 3.0)).norm() < 1e-9);
        // starts inside the upper arm and ends in the notch
        let lines = clipper.clip_line(Point2::new(1.0, 3.0), Point2::new(3.0, 3.0));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Point2::new(1.0, 3.0));
    }

    #[test]
    fn test_concave_line_completely_inside() {
        let clipper = ConcaveClipper::new(&l_shape()).unwrap();
        let lines = clipper.clip_line(Point2::new(0.5, 0.5), Point2::new(1.5, 1.5));
        assert_eq!(lines, vec![(Point2::new(0.5, 0.5), Point2::new(1.5, 1.5))]);
        assert!(clipper.clip_line(Point2::new(3.0, 3.0), Point2::new(3.5, 3.5)).is_empty());
    }

    #[test]
    fn test_concave_clip_polygon() {
        let clipper = ConcaveClipper::new(&l_shape()).unwrap();
        let parts = clipper.clip_polygon(&square(1.0, 1.0, 3.0, 3.0));
        let total: f64 = parts.iter().map(|p| area(p)).sum();
        assert!((total - 3.0).abs() < 1e-9);
        // subject completely inside the clipper
        let inner = square(0.5, 0.5, 1.5, 1.5);
        assert_eq!(clipper.clip_polygon(&inner), vec![inner]);
    }

    #[test]
    fn test_inverted_clipper_removes_inside() {
        let outer = BoundingBox2d::new(Point2::new(-10.0, -10.0), Point2::new(10.0, 10.0));
        let clipper = ConcaveClipper::inverted(&square(-1.0, -1.0, 1.0, 1.0), outer).unwrap();
        assert!(!clipper.is_inside(&Point2::new(0.0, 0.0)));
        assert!(clipper.is_inside(&Point2::new(5.0, 5.0)));
        let lines = clipper.clip_line(Point2::new(-5.0, 0.0), Point2::new(5.0, 0.0));
        assert_eq!(lines.len(), 2);
        let visible: f64 = lines.iter().map(|(a, b)| (b - a).norm()).sum();
        assert!((visible - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_polygon_is_closed() {
        let outer = BoundingBox2d::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0));
        let polygon =
            make_inverted_clipping_polygon(&square(4.0, 4.0, 6.0, 6.0), &outer, TOLERANCE).unwrap();
        // 4 inner + closing inner + 4 outer + closing outer + closing vertex
        assert_eq!(polygon.len(), 11);
        assert_eq!(polygon[0], polygon[10]);
        assert_eq!(find_closest_vertices(&square(4.0, 4.0, 6.0, 6.0), &[Point2::new(10.0, 10.0)]), (2, 0));
    }

    #[test]
    fn test_line_intersections_sorted_from_start() {
        let ips = polygon_line_intersections_2d(
            &square(0.0, 0.0, 2.0, 2.0),
            (Point2::new(3.0, 1.0), Point2::new(-1.0, 1.0)),
            TOLERANCE,
        );
        assert_eq!(ips.len(), 2);
        assert!((ips[0] - Point2::new(2.0, 1.0)).norm() < 1e-12);
        assert!((ips[1] - Point2::new(0.0, 1.0)).norm() < 1e-12);
    }
}
