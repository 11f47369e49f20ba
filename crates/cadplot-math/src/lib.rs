#![warn(missing_docs)]

//! Math types for the cadplot export pipeline.
//!
//! Thin wrappers around nalgebra providing the 2D types used by the
//! geometry buffers, clip engine and backends: points, vectors, affine
//! transforms, bounding boxes and tolerance constants.

use nalgebra::{Matrix3, Vector2, Vector3};

pub mod bbox;
pub mod construct;

pub use bbox::BoundingBox2d;
pub use construct::{
    area, has_clockwise_orientation, intersection_line_line_2d, is_axes_aligned_rectangle_2d,
    is_close, is_convex_polygon_2d, is_point_in_polygon_2d, point_to_line_relation,
    PolygonRelation,
};

/// A point in 2D space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 2D affine transformation stored as a 3x3 homogeneous matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    /// The underlying 3x3 matrix (column vectors, `m * p`).
    pub matrix: Matrix3<f64>,
}

impl Affine2 {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        let mut m = Matrix3::identity();
        m[(0, 2)] = dx;
        m[(1, 2)] = dy;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy)`.
    pub fn scale(sx: f64, sy: f64) -> Self {
        let mut m = Matrix3::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        Self { matrix: m }
    }

    /// Uniform scale.
    pub fn uniform_scale(s: f64) -> Self {
        Self::scale(s, s)
    }

    /// Counter-clockwise rotation about the origin by `angle` radians.
    pub fn rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix3::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Rotation by `degrees`, exact for multiples of 90 degrees.
    pub fn rotation_deg(degrees: f64) -> Self {
        let d = degrees.rem_euclid(360.0);
        let (s, c) = if d == 0.0 {
            (0.0, 1.0)
        } else if d == 90.0 {
            (1.0, 0.0)
        } else if d == 180.0 {
            (0.0, -1.0)
        } else if d == 270.0 {
            (-1.0, 0.0)
        } else {
            d.to_radians().sin_cos()
        };
        let mut m = Matrix3::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Build from the six coefficients of `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            matrix: Matrix3::new(a, c, e, b, d, f, 0.0, 0.0, 1.0),
        }
    }

    /// The six coefficients `[a, b, c, d, e, f]`, see
    /// [`Affine2::from_coefficients`].
    pub fn coefficients(&self) -> [f64; 6] {
        let m = &self.matrix;
        [m[(0, 0)], m[(1, 0)], m[(0, 1)], m[(1, 1)], m[(0, 2)], m[(1, 2)]]
    }

    /// Compose: apply `self` first, then `other` (`other * self`).
    pub fn then(&self, other: &Affine2) -> Self {
        Self {
            matrix: other.matrix * self.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point2) -> Point2 {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x, v.y)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec2) -> Vec2 {
        let r = self.matrix * Vector3::new(v.x, v.y, 0.0);
        Vec2::new(r.x, r.y)
    }

    /// Transform a slice of points in place.
    pub fn apply_inplace(&self, points: &mut [Point2]) {
        let m = &self.matrix;
        let (m00, m01, m02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
        let (m10, m11, m12) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
        for p in points.iter_mut() {
            let (x, y) = (p.x, p.y);
            p.x = m00 * x + m01 * y + m02;
            p.y = m10 * x + m11 * y + m12;
        }
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Returns `true` if this is the identity transform.
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix3::identity()
    }

    /// Scale factors along the transformed x- and y-axis.
    pub fn axis_scale(&self) -> (f64, f64) {
        let ux = self.apply_vec(&Vec2::x());
        let uy = self.apply_vec(&Vec2::y());
        (ux.norm(), uy.norm())
    }

    /// Returns `true` if the transform scales x and y by different amounts
    /// or shears the coordinate axes.
    pub fn has_stretching(&self) -> bool {
        let ux = self.apply_vec(&Vec2::x());
        let uy = self.apply_vec(&Vec2::y());
        let tol = Tolerance::DEFAULT;
        !(tol.is_zero(ux.norm_squared() - uy.norm_squared()) && tol.is_zero(ux.dot(&uy)))
    }
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in drawing units.
    pub linear: f64,
    /// Relative tolerance for `is_close` comparisons.
    pub relative: f64,
}

impl Tolerance {
    /// Default tolerances (1e-10 linear, 1e-9 relative).
    pub const DEFAULT: Self = Self {
        linear: 1e-10,
        relative: 1e-9,
    };

    /// Tight tolerance for vertex identity checks.
    pub const VERTEX: Self = Self {
        linear: 1e-12,
        relative: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point2, b: &Point2) -> bool {
        is_close(a, b, self.linear)
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() <= self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Affine2::identity();
        let p = Point2::new(1.0, 2.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
        assert!(t.is_identity());
    }

    #[test]
    fn test_coefficients_round_trip() {
        let m = Affine2::from_coefficients(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(m.coefficients(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_translation() {
        let t = Affine2::translation(10.0, 20.0);
        let result = t.apply_point(&Point2::new(1.0, 2.0));
        assert_relative_eq!(result.x, 11.0);
        assert_relative_eq!(result.y, 22.0);
    }

    #[test]
    fn test_rotation_90() {
        let t = Affine2::rotation(PI / 2.0);
        let result = t.apply_point(&Point2::new(1.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_deg_is_exact() {
        let t = Affine2::rotation_deg(270.0);
        let result = t.apply_point(&Point2::new(2.0, 0.0));
        assert_eq!(result, Point2::new(0.0, -2.0));
    }

    #[test]
    fn test_then_applies_self_first() {
        let translate = Affine2::translation(1.0, 0.0);
        let scale = Affine2::uniform_scale(2.0);
        // (0,0) -> (1,0) -> (2,0)
        let composed = translate.then(&scale);
        let result = composed.apply_point(&Point2::origin());
        assert_relative_eq!(result.x, 2.0);
        assert_relative_eq!(result.y, 0.0);
    }

    #[test]
    fn test_inverse() {
        let t = Affine2::translation(1.0, 2.0).then(&Affine2::rotation(0.3));
        let inv = t.inverse().unwrap();
        let p = Point2::new(5.0, 6.0);
        let result = inv.apply_point(&t.apply_point(&p));
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_apply_inplace_matches_apply_point() {
        let t = Affine2::from_coefficients(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let mut points = vec![Point2::new(1.0, 1.0), Point2::new(-2.0, 0.5)];
        let expected: Vec<Point2> = points.iter().map(|p| t.apply_point(p)).collect();
        t.apply_inplace(&mut points);
        assert_eq!(points, expected);
    }

    #[test]
    fn test_has_stretching() {
        assert!(!Affine2::rotation(0.7).has_stretching());
        assert!(!Affine2::uniform_scale(3.0).has_stretching());
        assert!(Affine2::scale(1.0, 2.0).has_stretching());
    }

    #[test]
    fn test_tolerance_points_equal() {
        let tol = Tolerance::DEFAULT;
        let a = Point2::new(1.0, 2.0);
        let b = Point2::new(1.0 + 1e-11, 2.0);
        assert!(tol.points_equal(&a, &b));
        let c = Point2::new(1.001, 2.0);
        assert!(!tol.points_equal(&a, &c));
    }
}
