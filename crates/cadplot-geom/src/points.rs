//! Contiguous 2D point buffer.

use cadplot_math::{Affine2, BoundingBox2d, Point2};

/// An ordered sequence of 2D points stored in one contiguous buffer.
///
/// Depending on context the points are a single point, a line, a
/// polyline, a polygon or a flat list of line endpoint pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Points2d {
    vertices: Vec<Point2>,
}

impl Points2d {
    /// Create from a vertex buffer.
    pub fn new(vertices: Vec<Point2>) -> Self {
        Self { vertices }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if there are no points.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Borrow the vertex buffer.
    pub fn vertices(&self) -> &[Point2] {
        &self.vertices
    }

    /// Consume into the vertex buffer.
    pub fn into_vertices(self) -> Vec<Point2> {
        self.vertices
    }

    /// Iterate consecutive `(start, end)` pairs of a flat line buffer.
    pub fn line_pairs(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        self.vertices.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }

    /// Transform all points in place.
    pub fn transform_inplace(&mut self, m: &Affine2) {
        m.apply_inplace(&mut self.vertices);
    }

    /// Minimum and maximum corner, `None` for an empty buffer.
    pub fn extents(&self) -> Option<(Point2, Point2)> {
        let bbox = self.bbox();
        bbox.has_data().then_some((bbox.extmin, bbox.extmax))
    }

    /// Bounding box, empty for an empty buffer.
    pub fn bbox(&self) -> BoundingBox2d {
        BoundingBox2d::from_points(self.vertices.iter())
    }
}

impl From<Vec<Point2>> for Points2d {
    fn from(vertices: Vec<Point2>) -> Self {
        Self::new(vertices)
    }
}

impl FromIterator<Point2> for Points2d {
    fn from_iter<I: IntoIterator<Item = Point2>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
