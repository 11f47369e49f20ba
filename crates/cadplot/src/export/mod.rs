//! Output backends and file writers.
//!
//! - [`svg`]: native SVG documents
//! - [`json`]: a custom JSON entity scheme
//! - [`page`]: adapter for external PDF and raster engines
//!
//! The HPGL/2 plotter backend lives in [`cadplot_hpgl`].

pub mod json;
pub mod page;
pub mod svg;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use cadplot_hpgl::{PlotterBackend, PlotterOptions};
use cadplot_render::{Page, Settings};
use log::debug;

use crate::Result;
use json::CustomJsonBackend;
use svg::SvgBackend;

fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;
    debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Write the recording of `backend` as SVG file.
pub fn write_svg(backend: &SvgBackend, page: &Page, settings: &Settings, path: impl AsRef<Path>) -> Result<()> {
    let svg = backend.get_string(page, settings, None)?;
    write_bytes(path.as_ref(), svg.as_bytes())
}

/// Write the recording of `backend` as HPGL/2 plot file.
pub fn write_hpgl(
    backend: &PlotterBackend,
    page: &Page,
    settings: &Settings,
    options: &PlotterOptions,
    path: impl AsRef<Path>,
) -> Result<()> {
    let data = backend.get_bytes(page, settings, None, options)?;
    write_bytes(path.as_ref(), &data)
}

/// Write the entities of `backend` as JSON file.
pub fn write_json(backend: &CustomJsonBackend, path: impl AsRef<Path>) -> Result<()> {
    let json = backend.get_string()?;
    write_bytes(path.as_ref(), json.as_bytes())
}
