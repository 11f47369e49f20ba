#![warn(missing_docs)]

//! HPGL/2 plot files for the cadplot export pipeline.
//!
//! This crate replays recorded drawings as HPGL/2 commands for raster
//! plotters:
//! 1. **Codec** ([`codec`]): the PE (polyline encoded) number format,
//!    polyline and Bezier path commands, and a decoder for PE commands.
//! 2. **Pens** ([`pens`]): the pen table written into the plot header.
//! 3. **Quality** ([`quality`]): output presets, from 7-bit compatible
//!    files without curves to high precision curves.
//! 4. **Plotter** ([`plotter`]): the [`PlotterBackend`] recorder and the
//!    renderer producing the final byte stream.
//!
//! # Example
//!
//! ```ignore
//! use cadplot_hpgl::PlotterBackend;
//! use cadplot_render::{Page, RenderPipeline, Settings, Units};
//!
//! let mut pipeline = RenderPipeline::new(PlotterBackend::new());
//! pipeline.draw_line(start, end, &properties);
//! let plotter = pipeline.into_backend();
//!
//! let page = Page::new(297.0, 210.0, Units::Mm);
//! let data = plotter.normal_quality(&page, &Settings::default())?;
//! std::fs::write("output.plt", data)?;
//! ```

pub mod codec;
pub mod pens;
pub mod plotter;
pub mod quality;

pub use codec::{path_encoder, pe_decode, pe_encode, polyline_encoder, PeBase, PeDecoder};
pub use pens::PenTable;
pub use plotter::{plot, PlotterBackend};
pub use quality::{PlotterOptions, PlotterQuality};

use thiserror::Error;

/// Errors decoding PE data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The data ended inside a number or command.
    #[error("unexpected end of PE data")]
    UnexpectedEnd,

    /// A byte outside of the digit ranges of the base.
    #[error("invalid PE digit {byte:#04x} at offset {offset}")]
    InvalidDigit {
        /// The offending byte.
        byte: u8,
        /// Offset of the byte in the input.
        offset: usize,
    },

    /// The command does not start with `PE`.
    #[error("invalid PE header: {0}")]
    InvalidHeader(String),

    /// The number does not fit into 64 bits.
    #[error("PE number overflow")]
    Overflow,
}

/// Result type for PE decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;
