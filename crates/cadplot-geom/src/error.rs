//! Error types for geometric buffers.

use thiserror::Error;

/// Errors raised by structural misuse of geometry buffers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The geometry does not have the structure the operation requires,
    /// e.g. a multi-path where a single ring is expected.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The geometry has no vertices.
    #[error("empty geometry")]
    EmptyGeometry,
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;
