#![warn(missing_docs)]

//! Rendering core of the cadplot export pipeline.
//!
//! Drawing primitives flow through these layers:
//! 1. **Property resolution** ([`resolver`]): source attributes of a
//!    primitive are resolved into [`Properties`] and a visibility flag.
//! 2. **Pipeline stages** ([`stages`], [`pipeline`]): clipping, linetype
//!    expansion and the adaptation to [`BackendProperties`].
//! 3. **Backends** ([`backend`]): the uniform output contract. The
//!    [`Recorder`] is a backend that captures records instead of writing
//!    output.
//! 4. **Replay** ([`player`]): bounding box, transform, crop and replay of
//!    captured records onto any backend.
//!
//! # Example
//!
//! ```ignore
//! use cadplot_render::{Configuration, Player, Recorder, RenderPipeline};
//!
//! let mut pipeline = RenderPipeline::new(Recorder::new());
//! pipeline.configure(Configuration::default());
//! pipeline.draw_line(start, end, &properties);
//! let mut player = pipeline.into_backend().player();
//! player.crop_rect(p1, p2, 0.01);
//! player.replay(&mut svg_backend, None);
//! ```

pub mod backend;
pub mod color;
pub mod config;
pub mod layout;
pub mod linetype;
pub mod pipeline;
pub mod player;
pub mod properties;
pub mod recorder;
pub mod resolver;
pub mod stages;

pub use backend::{Backend, ImageData, PixelBuffer};
pub use color::{aci_to_color, apply_color_policy, Color};
pub use config::{
    map_lineweight_to_stroke_width, BackgroundPolicy, ColorPolicy, Configuration, LinePolicy, LineweightPolicy,
    MAX_LINEWEIGHT_MM, MIN_LINEWEIGHT_MM,
};
pub use layout::{round_to, Layout, Margins, Page, PageAlignment, Settings, Units};
pub use linetype::DashRenderer;
pub use pipeline::RenderPipeline;
pub use player::{Override, Player};
pub use properties::{BackendProperties, LayerProperties, LayoutProperties, Properties};
pub use recorder::{Record, RecordData, Recorder};
pub use resolver::{ColorValue, LinetypeValue, LineweightValue, RenderContext, SourceAttributes};

/// Paths used by [`delegate_backend!`].
#[doc(hidden)]
pub mod __macro_support {
    pub use cadplot_geom::{Path2d, Points2d};
    pub use cadplot_math::Point2;
}

use thiserror::Error;

/// Errors of the rendering core.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Page or render settings are out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A color string is not "#RRGGBB" or "#RRGGBBAA".
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// Block reference states left on the state stack at teardown.
    #[error("unbalanced state stack, {0} state(s) not popped")]
    UnbalancedState(usize),

    /// A record refers to a property hash missing in the property table.
    #[error("unknown property hash {0:#x}")]
    UnknownProperties(u64),

    /// Malformed TOML configuration.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
