//! Axis-aligned 2D bounding box.
//!
//! Border semantics matter to the crop algorithm: [`BoundingBox2d::inside`]
//! and [`BoundingBox2d::has_overlap`] include the border,
//! [`BoundingBox2d::has_intersection`] excludes touching boxes.

use crate::{Affine2, Point2, Vec2};

/// Axis-aligned bounding box in 2D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox2d {
    /// Minimum corner.
    pub extmin: Point2,
    /// Maximum corner.
    pub extmax: Point2,
}

impl BoundingBox2d {
    /// Create a box from two arbitrary corner points.
    pub fn new(p1: Point2, p2: Point2) -> Self {
        Self {
            extmin: Point2::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            extmax: Point2::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            extmin: Point2::new(f64::INFINITY, f64::INFINITY),
            extmax: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Create the bounding box of `points`; empty for no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.include_point(p);
        }
        bbox
    }

    /// Returns `true` if the box has known limits.
    pub fn has_data(&self) -> bool {
        self.extmin.x <= self.extmax.x && self.extmin.y <= self.extmax.y
    }

    /// Returns `true` if the box is undefined or has zero area.
    pub fn is_empty(&self) -> bool {
        if self.has_data() {
            let s = self.size();
            s.x * s.y == 0.0
        } else {
            true
        }
    }

    /// Size of the box; zero for an undefined box.
    pub fn size(&self) -> Vec2 {
        if self.has_data() {
            self.extmax - self.extmin
        } else {
            Vec2::zeros()
        }
    }

    /// Center of the box.
    pub fn center(&self) -> Point2 {
        nalgebra::center(&self.extmin, &self.extmax)
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point2) {
        self.extmin.x = self.extmin.x.min(p.x);
        self.extmin.y = self.extmin.y.min(p.y);
        self.extmax.x = self.extmax.x.max(p.x);
        self.extmax.y = self.extmax.y.max(p.y);
    }

    /// Expand this box to include `other`; undefined boxes are ignored.
    pub fn extend(&mut self, other: &BoundingBox2d) {
        if other.has_data() {
            self.include_point(&other.extmin);
            self.include_point(&other.extmax);
        }
    }

    /// Union of both boxes.
    pub fn union(&self, other: &BoundingBox2d) -> Self {
        let mut result = *self;
        result.extend(other);
        result
    }

    /// Returns `true` if `p` is inside the box, the border is inside.
    pub fn inside(&self, p: &Point2) -> bool {
        if !self.has_data() {
            return false;
        }
        (self.extmin.x <= p.x && p.x <= self.extmax.x)
            && (self.extmin.y <= p.y && p.y <= self.extmax.y)
    }

    /// Returns `true` if `other` is completely inside this box.
    pub fn contains(&self, other: &BoundingBox2d) -> bool {
        self.inside(&other.extmin) && self.inside(&other.extmax)
    }

    /// Returns `true` if both boxes intersect, touching boxes do not intersect.
    pub fn has_intersection(&self, other: &BoundingBox2d) -> bool {
        if !self.has_data() || !other.has_data() {
            return false;
        }
        !(self.extmin.x >= other.extmax.x
            || self.extmax.x <= other.extmin.x
            || self.extmin.y >= other.extmax.y
            || self.extmax.y <= other.extmin.y)
    }

    /// Returns `true` if both boxes intersect, touching boxes overlap.
    pub fn has_overlap(&self, other: &BoundingBox2d) -> bool {
        if !self.has_data() || !other.has_data() {
            return false;
        }
        !(self.extmin.x > other.extmax.x
            || self.extmax.x < other.extmin.x
            || self.extmin.y > other.extmax.y
            || self.extmax.y < other.extmin.y)
    }

    /// Intersection box of both boxes, empty if they do not intersect.
    pub fn intersection(&self, other: &BoundingBox2d) -> Self {
        if !self.has_intersection(other) {
            return Self::empty();
        }
        Self {
            extmin: Point2::new(
                self.extmin.x.max(other.extmin.x),
                self.extmin.y.max(other.extmin.y),
            ),
            extmax: Point2::new(
                self.extmax.x.min(other.extmax.x),
                self.extmax.y.min(other.extmax.y),
            ),
        }
    }

    /// Corner vertices in counter-clockwise order starting at `extmin`.
    pub fn rect_vertices(&self) -> Option<[Point2; 4]> {
        if !self.has_data() {
            return None;
        }
        let (x0, y0) = (self.extmin.x, self.extmin.y);
        let (x1, y1) = (self.extmax.x, self.extmax.y);
        Some([
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ])
    }

    /// Grow (or shrink for negative values) the box uniformly.
    pub fn grow(&mut self, value: f64) {
        if self.has_data() {
            self.extmin -= Vec2::new(value, value);
            self.extmax += Vec2::new(value, value);
        }
    }

    /// Bounding box of the four transformed corners.
    pub fn transformed(&self, m: &Affine2) -> Self {
        match self.rect_vertices() {
            Some(mut corners) => {
                m.apply_inplace(&mut corners);
                Self::from_points(corners.iter())
            }
            None => Self::empty(),
        }
    }
}

impl Default for BoundingBox2d {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingBox2d {
        BoundingBox2d::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[test]
    fn test_empty_box_has_no_data() {
        let b = BoundingBox2d::empty();
        assert!(!b.has_data());
        assert!(b.is_empty());
        assert!(!b.inside(&Point2::origin()));
    }

    #[test]
    fn test_inside_includes_border() {
        let b = bbox(0.0, 0.0, 1.0, 1.0);
        assert!(b.inside(&Point2::new(1.0, 1.0)));
        assert!(b.inside(&Point2::new(0.0, 0.5)));
        assert!(!b.inside(&Point2::new(1.1, 0.5)));
    }

    #[test]
    fn test_touching_boxes_overlap_but_do_not_intersect() {
        let a = bbox(0.0, 0.0, 1.0, 1.0);
        let b = bbox(1.0, 1.0, 2.0, 2.0);
        assert!(!a.has_intersection(&b));
        assert!(a.has_overlap(&b));
    }

    #[test]
    fn test_intersection_box() {
        let a = bbox(0.0, 0.0, 2.0, 2.0);
        let b = bbox(1.0, 1.0, 3.0, 3.0);
        assert_eq!(a.intersection(&b), bbox(1.0, 1.0, 2.0, 2.0));
        assert!(!a.intersection(&bbox(5.0, 5.0, 6.0, 6.0)).has_data());
    }

    #[test]
    fn test_degenerate_box_has_data() {
        let b = BoundingBox2d::from_points([Point2::new(3.0, 4.0)].iter());
        assert!(b.has_data());
        assert!(b.is_empty());
    }

    #[test]
    fn test_transformed_rotated_box() {
        let b = bbox(0.0, 0.0, 2.0, 1.0);
        let r = b.transformed(&Affine2::rotation_deg(90.0));
        assert_eq!(r, bbox(-1.0, 0.0, 0.0, 2.0));
    }
}
