#![warn(missing_docs)]

//! cadplot: vector drawing export for CAD data.
//!
//! Drawing primitives are resolved, clipped and captured once, then placed
//! on a page and replayed onto output backends:
//! 1. **Capture**: a [`RenderPipeline`] in front of a [`Recorder`], or any
//!    exporting backend which records by itself.
//! 2. **Layout**: the recording is fitted, aligned and optionally cropped
//!    at the page margins.
//! 3. **Output**: [`SvgBackend`], [`PlotterBackend`] (HPGL/2),
//!    [`CustomJsonBackend`] and [`PageBackend`] for external PDF or raster
//!    engines.
//! 4. **Tiles**: [`export_tiles`] renders a grid of crops in parallel.
//!
//! # Example
//!
//! ```ignore
//! use cadplot::{Backend, BackendProperties, Page, Settings, SvgBackend, Units};
//!
//! let mut svg = SvgBackend::new();
//! svg.draw_line(start, end, &BackendProperties::default());
//! let page = Page::new(297.0, 210.0, Units::Mm);
//! let document = svg.get_string(&page, &Settings::default(), None)?;
//! ```

pub mod export;
pub mod tiles;

pub use cadplot_clip as clip;
pub use cadplot_geom as geom;
pub use cadplot_hpgl as hpgl;
pub use cadplot_math as math;
pub use cadplot_render as render;

pub use cadplot_geom::{GeometryError, Path2d, Points2d};
pub use cadplot_hpgl::{PlotterBackend, PlotterOptions, PlotterQuality};
pub use cadplot_math::{Affine2, BoundingBox2d, Point2};
pub use cadplot_render::{
    Backend, BackendProperties, Color, Configuration, LineweightPolicy, Margins, Page, PageAlignment, Player,
    Recorder, RenderError, RenderPipeline, Settings, Units,
};
pub use export::json::CustomJsonBackend;
pub use export::page::{PageBackend, PageEngine, PageEngineBackend, StrokeStyle};
pub use export::svg::SvgBackend;
pub use export::{write_hpgl, write_json, write_svg};
pub use tiles::export_tiles;

use thiserror::Error;

/// Errors of the export facade.
#[derive(Debug, Error)]
pub enum CadError {
    /// Writing the output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Layout or replay failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Invalid geometry.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding failed.
    #[error("image error: {0}")]
    Image(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, CadError>;
