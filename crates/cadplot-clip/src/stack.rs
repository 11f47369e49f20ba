//! Stack of nested clip shapes.

use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{Affine2, Point2};

use crate::shape::{ClipShape, PolygonClip};

#[derive(Debug, Clone)]
struct ClipStage {
    shape: ClipShape,
    transform: Option<Affine2>,
}

/// Manages the clip shapes of nested viewports and clipped block references.
///
/// Clipping runs from the top of the stack down. Each stage first applies
/// its transform to the geometry and then clips it by its shape; clipping
/// stops as soon as nothing is left.
#[derive(Debug, Clone, Default)]
pub struct ClipStack {
    stages: Vec<ClipStage>,
}

impl ClipStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if any clip shape is active.
    pub fn is_active(&self) -> bool {
        !self.stages.is_empty()
    }

    /// Number of stacked shapes.
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    /// Push a clip shape; `transform` maps the geometry drawn inside the
    /// shape into the coordinate system of the shape.
    pub fn push(&mut self, shape: ClipShape, transform: Option<Affine2>) {
        self.stages.push(ClipStage { shape, transform });
    }

    /// Remove the topmost clip shape.
    pub fn pop(&mut self) {
        self.stages.pop();
    }

    fn stages(&self) -> impl Iterator<Item = &ClipStage> {
        self.stages.iter().rev()
    }

    /// Returns the point if it survives all clip shapes, in the coordinate
    /// system of the bottom shape.
    pub fn clip_point(&self, point: Point2) -> Option<Point2> {
        let mut result = point;
        for stage in self.stages() {
            if let Some(m) = &stage.transform {
                result = m.apply_point(&result);
            }
            result = stage.shape.clip_point(result)?;
        }
        Some(result)
    }

    /// Returns the visible parts of a line.
    pub fn clip_line(&self, start: Point2, end: Point2) -> Vec<(Point2, Point2)> {
        let mut result = vec![(start, end)];
        for stage in self.stages() {
            let lines = std::mem::take(&mut result);
            for (mut s, mut e) in lines {
                if let Some(m) = &stage.transform {
                    s = m.apply_point(&s);
                    e = m.apply_point(&e);
                }
                result.extend(stage.shape.clip_line(s, e));
            }
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// Returns the visible parts of an open polyline.
    pub fn clip_polyline(&self, points: Points2d) -> Vec<Points2d> {
        let mut result = vec![points];
        for stage in self.stages() {
            let polylines = std::mem::take(&mut result);
            for mut polyline in polylines {
                if let Some(m) = &stage.transform {
                    polyline.transform_inplace(m);
                }
                result.extend(stage.shape.clip_polyline(polyline));
            }
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// Returns the visible parts of a closed polygon.
    pub fn clip_polygon(&self, points: Points2d) -> Vec<Points2d> {
        self.clip_polygon_tracked(points).into_parts()
    }

    /// Like [`ClipStack::clip_polygon`], but reports a polygon that every
    /// stage passed through untouched as [`PolygonClip::Inside`].
    pub(crate) fn clip_polygon_tracked(&self, points: Points2d) -> PolygonClip {
        let mut unchanged = true;
        let mut result = vec![points];
        for stage in self.stages() {
            let polygons = std::mem::take(&mut result);
            for mut polygon in polygons {
                if let Some(m) = &stage.transform {
                    polygon.transform_inplace(m);
                }
                match stage.shape.clip_polygon_tracked(polygon) {
                    PolygonClip::Inside(polygon) => result.push(polygon),
                    PolygonClip::Parts(parts) => {
                        unchanged = false;
                        result.extend(parts);
                    }
                }
            }
            if result.is_empty() {
                break;
            }
        }
        match (unchanged, result.len()) {
            (true, 1) => PolygonClip::Inside(result.remove(0)),
            _ => PolygonClip::Parts(result),
        }
    }

    /// Returns the visible parts of open paths.
    pub fn clip_paths(&self, paths: Vec<Path2d>, max_sagitta: f64) -> Vec<Path2d> {
        let mut result = paths;
        for stage in self.stages() {
            if let Some(m) = &stage.transform {
                for path in result.iter_mut() {
                    path.transform_inplace(m);
                }
            }
            result = stage.shape.clip_paths(&result, max_sagitta);
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// Returns the visible parts of filled paths as closed paths.
    pub fn clip_filled_paths(&self, paths: Vec<Path2d>, max_sagitta: f64) -> Vec<Path2d> {
        let mut result = paths;
        for stage in self.stages() {
            if let Some(m) = &stage.transform {
                for path in result.iter_mut() {
                    path.transform_inplace(m);
                }
            }
            result = stage.shape.clip_filled_paths(&result, max_sagitta);
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// Append the transforms of all stages, from the top of the stack
    /// down, to `m`.
    pub fn transform_matrix(&self, m: &Affine2) -> Affine2 {
        self.stages()
            .filter_map(|stage| stage.transform.as_ref())
            .fold(*m, |acc, t| acc.then(t))
    }

    /// Clip an image boundary polygon given in pixel coordinates.
    ///
    /// `m` maps pixel coordinates to drawing coordinates. Returns `None` if
    /// the boundary is not clipped at all or the pixel space can't be
    /// recovered, otherwise the clipped parts in pixel coordinates
    /// (possibly none).
    pub fn clip_image_polygon(&self, polygon_px: &Points2d, m: &Affine2) -> Option<Vec<Points2d>> {
        let inverse = self.transform_matrix(m).inverse()?;
        let mut polygon = polygon_px.clone();
        polygon.transform_inplace(m);
        match self.clip_polygon_tracked(polygon) {
            PolygonClip::Inside(_) => None,
            PolygonClip::Parts(mut parts) => {
                for part in parts.iter_mut() {
                    part.transform_inplace(&inverse);
                }
                Some(parts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_shape(x0: f64, y0: f64, x1: f64, y1: f64) -> ClipShape {
        ClipShape::rect(&[Point2::new(x0, y0), Point2::new(x1, y1)]).unwrap()
    }

    #[test]
    fn test_push_pop() {
        let mut stack = ClipStack::new();
        assert!(!stack.is_active());
        stack.push(rect_shape(0.0, 0.0, 1.0, 1.0), None);
        assert!(stack.is_active());
        assert_eq!(stack.depth(), 1);
        stack.pop();
        stack.pop();
        assert!(!stack.is_active());
    }

    #[test]
    fn test_nested_shapes_intersect() {
        let mut stack = ClipStack::new();
        stack.push(rect_shape(0.0, 0.0, 10.0, 10.0), None);
        stack.push(rect_shape(5.0, 0.0, 20.0, 10.0), None);
        let lines = stack.clip_line(Point2::new(-5.0, 5.0), Point2::new(25.0, 5.0));
        assert_eq!(lines, vec![(Point2::new(5.0, 5.0), Point2::new(10.0, 5.0))]);
        assert!(stack.clip_point(Point2::new(2.0, 5.0)).is_none());
        assert_eq!(stack.clip_point(Point2::new(7.0, 5.0)), Some(Point2::new(7.0, 5.0)));
    }

    #[test]
    fn test_stage_transform_is_applied_before_clipping() {
        let mut stack = ClipStack::new();
        stack.push(rect_shape(0.0, 0.0, 10.0, 10.0), Some(Affine2::translation(10.0, 0.0)));
        // (-5, 5) moves to (5, 5) which is inside
        assert_eq!(stack.clip_point(Point2::new(-5.0, 5.0)), Some(Point2::new(5.0, 5.0)));
        let m = stack.transform_matrix(&Affine2::uniform_scale(2.0));
        assert_eq!(m.apply_point(&Point2::new(1.0, 1.0)), Point2::new(12.0, 2.0));
    }

    #[test]
    fn test_polygon_inside_is_reported_unchanged() {
        let mut stack = ClipStack::new();
        stack.push(rect_shape(0.0, 0.0, 10.0, 10.0), None);
        let polygon = Points2d::new(vec![
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 1.0),
            Point2::new(2.0, 2.0),
        ]);
        assert!(matches!(stack.clip_polygon_tracked(polygon.clone()), PolygonClip::Inside(_)));
        assert!(stack.clip_image_polygon(&polygon, &Affine2::identity()).is_none());
    }

    #[test]
    fn test_image_polygon_is_clipped_in_pixel_space() {
        let mut stack = ClipStack::new();
        stack.push(rect_shape(0.0, 0.0, 5.0, 10.0), None);
        let boundary = Points2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]);
        // 1 pixel = 0.5 drawing units, the image fits into the clip rect
        assert!(stack.clip_image_polygon(&boundary, &Affine2::uniform_scale(0.5)).is_none());
        // 1 pixel = 2 drawing units, visible are the pixels x <= 2.5, y <= 5
        let parts = stack
            .clip_image_polygon(&boundary, &Affine2::uniform_scale(2.0))
            .unwrap();
        assert_eq!(parts.len(), 1);
        let bbox = parts[0].bbox();
        assert!((bbox.extmax.x - 2.5).abs() < 1e-9);
        assert!((bbox.extmax.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_paths_stops_when_empty() {
        let mut stack = ClipStack::new();
        stack.push(rect_shape(0.0, 0.0, 1.0, 1.0), None);
        stack.push(rect_shape(5.0, 5.0, 6.0, 6.0), None);
        let path = Path2d::from_vertices([Point2::new(5.5, 5.5), Point2::new(5.8, 5.8)], false);
        assert!(stack.clip_paths(vec![path], 0.01).is_empty());
    }
}
