//! Clip shapes: a clipping region with fast bounding box tests.
//!
//! Open shapes (lines, polylines, paths) clip into open parts, closed
//! shapes (polygons, filled paths) clip into closed parts. Curves that
//! straddle the boundary are flattened before clipping; curves completely
//! inside a rectangle are passed through untouched.

use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{
    is_axes_aligned_rectangle_2d, is_convex_polygon_2d, BoundingBox2d, Point2,
};
use log::debug;

use crate::polygon::{Clipper, ConcaveClipper, ConvexClipper, RectClipper};
use crate::{ClipError, Result};

/// Segment count for the initial subdivision of curves during clipping.
const CLIP_SEGMENTS: usize = 4;

/// A clipping region.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipShape {
    /// Axis-aligned rectangle, removes everything outside.
    Rect {
        /// Clipper for the rectangle.
        clipper: RectClipper,
        /// Zero-area rectangle: removes everything.
        remove_all: bool,
    },
    /// Convex polygon, removes everything outside.
    Convex {
        /// Extents of the polygon.
        bbox: BoundingBox2d,
        /// Clipper for the polygon.
        clipper: ConvexClipper,
    },
    /// Arbitrary polygon, removes everything outside.
    Concave {
        /// Extents of the polygon.
        bbox: BoundingBox2d,
        /// Clipper for the polygon.
        clipper: ConcaveClipper,
    },
    /// Removes everything inside a polygon and outside the outer bounds.
    Inverted {
        /// The outer bounds.
        bbox: BoundingBox2d,
        /// Clipper for the bridged polygon.
        clipper: ConcaveClipper,
    },
}

/// Result of clipping a closed polygon.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PolygonClip {
    /// The polygon is completely inside, returned unchanged.
    Inside(Points2d),
    /// The clipped parts, possibly none.
    Parts(Vec<Points2d>),
}

impl PolygonClip {
    pub(crate) fn into_parts(self) -> Vec<Points2d> {
        match self {
            PolygonClip::Inside(points) => vec![points],
            PolygonClip::Parts(parts) => parts,
        }
    }
}

fn checked_bbox(vertices: &[Point2]) -> Result<BoundingBox2d> {
    let bbox = BoundingBox2d::from_points(vertices.iter());
    if !bbox.has_data() {
        return Err(ClipError::InvalidGeometry("clipping box not detectable".into()));
    }
    Ok(bbox)
}

impl ClipShape {
    /// Rectangle shape from the extents of `vertices`.
    pub fn rect(vertices: &[Point2]) -> Result<Self> {
        let bbox = checked_bbox(vertices)?;
        let size = bbox.size();
        Ok(ClipShape::Rect {
            clipper: RectClipper::new(bbox.extmin, bbox.extmax),
            remove_all: size.x * size.y < 1e-9,
        })
    }

    /// Convex polygon shape.
    pub fn convex(vertices: &[Point2]) -> Result<Self> {
        Ok(ClipShape::Convex {
            bbox: checked_bbox(vertices)?,
            clipper: ConvexClipper::new(vertices)?,
        })
    }

    /// Concave polygon shape.
    pub fn concave(vertices: &[Point2]) -> Result<Self> {
        Ok(ClipShape::Concave {
            bbox: checked_bbox(vertices)?,
            clipper: ConcaveClipper::new(vertices)?,
        })
    }

    /// Inverted polygon shape, the `outer_bounds` must be larger than the
    /// content to clip.
    pub fn inverted(vertices: &[Point2], outer_bounds: BoundingBox2d) -> Result<Self> {
        if !outer_bounds.has_data() {
            return Err(ClipError::InvalidGeometry("clipping box not detectable".into()));
        }
        Ok(ClipShape::Inverted {
            bbox: outer_bounds,
            clipper: ConcaveClipper::inverted(vertices, outer_bounds)?,
        })
    }

    fn clipper(&self) -> &dyn Clipper {
        match self {
            ClipShape::Rect { clipper, .. } => clipper,
            ClipShape::Convex { clipper, .. } => clipper,
            ClipShape::Concave { clipper, .. } | ClipShape::Inverted { clipper, .. } => clipper,
        }
    }

    fn removes_all(&self) -> bool {
        matches!(self, ClipShape::Rect { remove_all: true, .. })
    }

    /// Extents of the clipping region.
    pub fn bbox(&self) -> BoundingBox2d {
        match self {
            ClipShape::Rect { clipper, .. } => *clipper.bbox(),
            ClipShape::Convex { bbox, .. }
            | ClipShape::Concave { bbox, .. }
            | ClipShape::Inverted { bbox, .. } => *bbox,
        }
    }

    /// Returns `true` if `other` is known to be completely inside the
    /// region; `false` means unknown for non-rectangular shapes.
    pub fn is_completely_inside(&self, other: &BoundingBox2d) -> bool {
        match self {
            ClipShape::Rect { clipper, .. } => clipper.bbox().contains(other),
            _ => false,
        }
    }

    /// Returns `true` if `other` is completely outside the region.
    pub fn is_completely_outside(&self, other: &BoundingBox2d) -> bool {
        !self.bbox().has_intersection(other)
    }

    /// Returns the point if it is inside the region.
    pub fn clip_point(&self, point: Point2) -> Option<Point2> {
        if self.removes_all() {
            return None;
        }
        self.clipper().is_inside(&point).then_some(point)
    }

    /// Returns the visible parts of a line.
    pub fn clip_line(&self, start: Point2, end: Point2) -> Vec<(Point2, Point2)> {
        if self.removes_all() {
            return Vec::new();
        }
        self.clipper().clip_line(start, end)
    }

    /// Returns the visible parts of an open polyline.
    pub fn clip_polyline(&self, points: Points2d) -> Vec<Points2d> {
        if self.removes_all() || points.is_empty() {
            return Vec::new();
        }
        let bbox = points.bbox();
        if self.is_completely_outside(&bbox) {
            return Vec::new();
        }
        if self.is_completely_inside(&bbox) {
            return vec![points];
        }
        self.clipper()
            .clip_polyline(points.vertices())
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(Points2d::new)
            .collect()
    }

    /// Returns the visible parts of a closed polygon.
    pub fn clip_polygon(&self, points: Points2d) -> Vec<Points2d> {
        self.clip_polygon_tracked(points).into_parts()
    }

    pub(crate) fn clip_polygon_tracked(&self, points: Points2d) -> PolygonClip {
        if self.removes_all() || points.len() < 2 {
            return PolygonClip::Parts(Vec::new());
        }
        let bbox = points.bbox();
        if self.is_completely_outside(&bbox) {
            return PolygonClip::Parts(Vec::new());
        }
        if self.is_completely_inside(&bbox) {
            return PolygonClip::Inside(points);
        }
        PolygonClip::Parts(
            self.clipper()
                .clip_polygon(points.vertices())
                .into_iter()
                .filter(|part| !part.is_empty())
                .map(Points2d::new)
                .collect(),
        )
    }

    /// Returns the visible parts of open paths; each sub-path is clipped
    /// on its own. Straddling sub-paths are flattened with `max_sagitta`.
    pub fn clip_paths(&self, paths: &[Path2d], max_sagitta: f64) -> Vec<Path2d> {
        let mut result = Vec::new();
        if self.removes_all() {
            return result;
        }
        for path in paths {
            for sub_path in path.sub_paths() {
                let path_bbox = BoundingBox2d::from_points(sub_path.control_vertices().iter());
                if !path_bbox.has_data() {
                    continue;
                }
                if self.is_completely_inside(&path_bbox) {
                    result.push(sub_path);
                    continue;
                }
                if self.is_completely_outside(&path_bbox) {
                    continue;
                }
                let polyline: Vec<Point2> = sub_path.flattening(max_sagitta, CLIP_SEGMENTS).collect();
                for part in self.clipper().clip_polyline(&polyline) {
                    if !part.is_empty() {
                        result.push(Path2d::from_vertices(part, false));
                    }
                }
            }
        }
        result
    }

    /// Returns the visible parts of filled paths as closed paths.
    pub fn clip_filled_paths(&self, paths: &[Path2d], max_sagitta: f64) -> Vec<Path2d> {
        let mut result = Vec::new();
        if self.removes_all() {
            return result;
        }
        for path in paths {
            for sub_path in path.sub_paths() {
                if sub_path.len() < 2 {
                    debug!("skipping degenerate filled sub-path");
                    continue;
                }
                let path_bbox = BoundingBox2d::from_points(sub_path.control_vertices().iter());
                if self.is_completely_inside(&path_bbox) {
                    result.push(sub_path);
                    continue;
                }
                if self.is_completely_outside(&path_bbox) {
                    continue;
                }
                let polygon: Vec<Point2> = sub_path.flattening(max_sagitta, CLIP_SEGMENTS).collect();
                for part in self.clipper().clip_polygon(&polygon) {
                    if !part.is_empty() {
                        result.push(Path2d::from_vertices(part, true));
                    }
                }
            }
        }
        result
    }
}

/// Returns the fastest clip shape for the clipping `polygon`: a rectangle
/// for axis-aligned 4-gons, a convex shape for convex polygons and a
/// concave shape otherwise.
pub fn find_best_clipping_shape(polygon: &[Point2]) -> Result<ClipShape> {
    if is_axes_aligned_rectangle_2d(polygon) {
        ClipShape::rect(polygon)
    } else if is_convex_polygon_2d(polygon, false, 1e-6) {
        ClipShape::convex(polygon)
    } else {
        ClipShape::concave(polygon)
    }
}

/// Returns a clip shape that removes everything inside `polygon` and
/// beyond `outer_bounds`.
pub fn make_inverted_clipping_shape(polygon: &[Point2], outer_bounds: BoundingBox2d) -> Result<ClipShape> {
    ClipShape::inverted(polygon, outer_bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    #[test]
    fn test_find_best_clipping_shape() {
        assert!(matches!(
            find_best_clipping_shape(&square(0.0, 0.0, 1.0, 1.0)).unwrap(),
            ClipShape::Rect { remove_all: false, .. }
        ));
        let triangle = [Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(1.0, 2.0)];
        assert!(matches!(find_best_clipping_shape(&triangle).unwrap(), ClipShape::Convex { .. }));
        let l_shape = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(matches!(find_best_clipping_shape(&l_shape).unwrap(), ClipShape::Concave { .. }));
    }

    #[test]
    fn test_degenerate_rect_removes_all() {
        let shape = ClipShape::rect(&[Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)]).unwrap();
        assert!(matches!(shape, ClipShape::Rect { remove_all: true, .. }));
        assert!(shape.clip_point(Point2::new(1.0, 0.0)).is_none());
        assert!(shape.clip_line(Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)).is_empty());
    }

    #[test]
    fn test_empty_clip_polygon_is_an_error() {
        assert!(matches!(ClipShape::rect(&[]), Err(ClipError::InvalidGeometry(_))));
    }

    #[test]
    fn test_rect_passes_inside_paths_untouched() {
        let shape = ClipShape::rect(&square(0.0, 0.0, 10.0, 10.0)).unwrap();
        let mut path = Path2d::new(Point2::new(1.0, 1.0));
        path.curve3_to(Point2::new(9.0, 1.0), Point2::new(5.0, 9.0));
        let result = shape.clip_paths(&[path.clone()], 0.01);
        assert_eq!(result, vec![path]);
    }

    #[test]
    fn test_straddling_path_is_flattened_and_clipped() {
        let shape = ClipShape::rect(&square(0.0, 0.0, 10.0, 10.0)).unwrap();
        let mut path = Path2d::new(Point2::new(5.0, 5.0));
        path.curve3_to(Point2::new(15.0, 5.0), Point2::new(10.0, 12.0));
        let result = shape.clip_paths(&[path], 0.01);
        assert!(!result.is_empty());
        for part in &result {
            assert!(!part.has_curves());
            for v in part.control_vertices() {
                assert!(v.x <= 10.0 + 1e-9 && v.y <= 10.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_clip_filled_paths_yields_closed_paths() {
        let shape = ClipShape::convex(&[Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(0.0, 10.0)])
            .unwrap();
        let path = Path2d::from_vertices(square(-5.0, -5.0, 5.0, 5.0), true);
        let result = shape.clip_filled_paths(&[path], 0.01);
        assert_eq!(result.len(), 1);
        assert!(result[0].is_closed());
    }

    #[test]
    fn test_polyline_outside_bbox_is_dropped() {
        let shape = ClipShape::concave(&[
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ])
        .unwrap();
        let points = Points2d::new(vec![Point2::new(5.0, 5.0), Point2::new(6.0, 6.0)]);
        assert!(shape.clip_polyline(points).is_empty());
    }

    #[test]
    fn test_inverted_shape_bbox_is_outer_bounds() {
        let outer = BoundingBox2d::new(Point2::new(-10.0, -10.0), Point2::new(10.0, 10.0));
        let shape = make_inverted_clipping_shape(&square(-1.0, -1.0, 1.0, 1.0), outer).unwrap();
        assert_eq!(shape.bbox(), outer);
        assert!(shape.clip_point(Point2::new(0.0, 0.0)).is_none());
        assert_eq!(shape.clip_point(Point2::new(5.0, 0.0)), Some(Point2::new(5.0, 0.0)));
    }
}
