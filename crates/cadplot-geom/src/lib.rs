#![warn(missing_docs)]

//! Geometric buffers for the cadplot export pipeline.
//!
//! [`Points2d`] and [`Path2d`] store their vertices in owned, contiguous
//! buffers so that transformation and cropping of large recordings work
//! by index over plain slices.
//!
//! # Example
//!
//! ```
//! use cadplot_geom::Path2d;
//! use cadplot_math::{Affine2, Point2};
//!
//! let mut path = Path2d::new(Point2::new(0.0, 0.0));
//! path.line_to(Point2::new(10.0, 0.0));
//! path.curve3_to(Point2::new(10.0, 10.0), Point2::new(15.0, 5.0));
//! path.transform_inplace(&Affine2::uniform_scale(2.0));
//! assert_eq!(path.end(), Some(Point2::new(20.0, 20.0)));
//! ```

pub mod bezier;
pub mod error;
pub mod path;
pub mod points;

pub use bezier::{Bezier3P, Bezier4P};
pub use error::{GeometryError, Result};
pub use path::{single_paths, Command, Path2d, PathElement};
pub use points::Points2d;
