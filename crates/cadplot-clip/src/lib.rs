#![warn(missing_docs)]

//! Clip engine for the cadplot export pipeline.
//!
//! The engine is layered:
//! 1. **Line clippers** ([`lines`]): Cohen-Sutherland for axis-aligned
//!    rectangles and the polyline merge helper shared by all clippers.
//! 2. **Polygon clippers** ([`polygon`]): convex (Sutherland-Hodgman),
//!    concave (edge intersections + Greiner-Hormann) and inverted clipping.
//! 3. **Clip shapes** ([`shape`]): a bounding box plus a clipper, with
//!    fast accept/reject tests and path/filled-path clipping.
//! 4. **Clip stack** ([`stack`]): nested clip shapes from viewports and
//!    clipped block references, applied top to bottom.

pub mod greiner_hormann;
pub mod lines;
pub mod polygon;
pub mod shape;
pub mod stack;

pub use lines::CohenSutherland;
pub use polygon::{Clipper, ConcaveClipper, ConvexClipper, RectClipper};
pub use shape::{find_best_clipping_shape, make_inverted_clipping_shape, ClipShape};
pub use stack::ClipStack;

use cadplot_geom::GeometryError;
use thiserror::Error;

/// Absolute tolerance used by all clipping algorithms.
pub const TOLERANCE: f64 = 1e-10;

/// Errors raised while building clip shapes.
#[derive(Debug, Error)]
pub enum ClipError {
    /// The clipping polygon is degenerate.
    #[error("invalid clipping geometry: {0}")]
    InvalidGeometry(String),
    /// Error from the geometric buffers.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Result type for clip operations.
pub type Result<T> = std::result::Result<T, ClipError>;
