//! Output quality presets.

use serde::{Deserialize, Serialize};

use crate::codec::PeBase;

/// Output quality of HPGL/2 plot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotterQuality {
    /// 7-bit PE encoding without curves, for old plotters.
    Compatible,
    /// Integer plot units with curves.
    Low,
    /// One decimal place with curves.
    #[default]
    Normal,
    /// Two decimal places with curves.
    High,
}

impl PlotterQuality {
    /// Encoder options of the preset.
    pub fn options(&self) -> PlotterOptions {
        match self {
            PlotterQuality::Compatible => PlotterOptions {
                curves: false,
                decimal_places: 0,
                base: PeBase::Base32,
            },
            PlotterQuality::Low => PlotterOptions {
                curves: true,
                decimal_places: 0,
                base: PeBase::Base64,
            },
            PlotterQuality::Normal => PlotterOptions {
                curves: true,
                decimal_places: 1,
                base: PeBase::Base64,
            },
            PlotterQuality::High => PlotterOptions {
                curves: true,
                decimal_places: 2,
                base: PeBase::Base64,
            },
        }
    }
}

/// HPGL/2 encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterOptions {
    /// Write Bezier curves, flatten curves otherwise.
    pub curves: bool,
    /// Precision of plot unit coordinates; fewer places give smaller files
    /// and coarser curves.
    pub decimal_places: u32,
    /// PE digit base.
    pub base: PeBase,
}

impl Default for PlotterOptions {
    fn default() -> Self {
        PlotterQuality::Normal.options()
    }
}

impl From<PlotterQuality> for PlotterOptions {
    fn from(quality: PlotterQuality) -> Self {
        quality.options()
    }
}

impl PlotterOptions {
    /// Fractional bits of PE numbers for the decimal places.
    pub fn fractional_bits(&self) -> u32 {
        (f64::from(self.decimal_places) * 3.33).round() as u32
    }
}
