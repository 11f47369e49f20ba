//! Render configuration.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::layout::round_to;
use crate::Result;

/// Thinnest stroke width in mm a backend draws.
pub const MIN_LINEWEIGHT_MM: f64 = 0.05;

/// Thickest lineweight in mm a drawing defines.
pub const MAX_LINEWEIGHT_MM: f64 = 2.11;

/// How styled (dashed, dotted) lines are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePolicy {
    /// Draw every line solid.
    Solid,
    /// Expand linetype patterns into dash segments.
    #[default]
    Accurate,
}

/// How lineweights become stroke widths in page-based backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineweightPolicy {
    /// Lineweight in mm, scaled by `lineweight_scaling`.
    #[default]
    Absolute,
    /// Stroke widths relative to the page size.
    Relative,
    /// One stroke width relative to the page size for all lines.
    RelativeFixed,
}

/// How resolved colors are mapped before they reach a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPolicy {
    /// Colors as resolved.
    #[default]
    Color,
    /// Colors as resolved, black and white swapped.
    SwapBw,
    /// Inverted colors.
    Negative,
    /// Gray scale for a dark background.
    MonochromeDarkBg,
    /// Gray scale for a light background.
    MonochromeLightBg,
    /// Every color black.
    Black,
    /// Every color white.
    White,
    /// Every color [`Configuration::custom_fg_color`].
    Custom,
}

/// How the background color is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundPolicy {
    /// Background as resolved from the layout.
    #[default]
    Default,
    /// White background.
    White,
    /// Black background.
    Black,
    /// Fully transparent background.
    Off,
    /// [`Configuration::custom_bg_color`].
    Custom,
}

/// Immutable render configuration passed to every `configure()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Drawing method for styled lines.
    pub line_policy: LinePolicy,
    /// Stroke width mapping of page-based backends.
    pub lineweight_policy: LineweightPolicy,
    /// Factor for every lineweight; 0 draws all lines with the minimum
    /// lineweight.
    pub lineweight_scaling: f64,
    /// Minimum line width in 1/300 inch, `None` lets the backend choose.
    pub min_lineweight: Option<f64>,
    /// Minimum dash length of styled lines in drawing units.
    pub min_dash_length: f64,
    /// Maximum distance between a curve and its flattened polyline in
    /// drawing units.
    pub max_flattening_distance: f64,
    /// Color mapping.
    pub color_policy: ColorPolicy,
    /// Substitute color for [`ColorPolicy::Custom`].
    pub custom_fg_color: Color,
    /// Background color choice.
    pub background_policy: BackgroundPolicy,
    /// Background color for [`BackgroundPolicy::Custom`].
    pub custom_bg_color: Color,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            line_policy: LinePolicy::Accurate,
            lineweight_policy: LineweightPolicy::Absolute,
            lineweight_scaling: 1.0,
            min_lineweight: None,
            min_dash_length: 0.1,
            max_flattening_distance: 0.01,
            color_policy: ColorPolicy::Color,
            custom_fg_color: Color::BLACK,
            background_policy: BackgroundPolicy::Default,
            custom_bg_color: Color::WHITE,
        }
    }
}

impl Configuration {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Copy with another line policy.
    pub fn with_line_policy(&self, line_policy: LinePolicy) -> Self {
        Self { line_policy, ..self.clone() }
    }

    /// Copy with another lineweight policy.
    pub fn with_lineweight_policy(&self, lineweight_policy: LineweightPolicy) -> Self {
        Self { lineweight_policy, ..self.clone() }
    }

    /// Copy with another lineweight scaling factor.
    pub fn with_lineweight_scaling(&self, lineweight_scaling: f64) -> Self {
        Self { lineweight_scaling, ..self.clone() }
    }

    /// Copy with another minimum lineweight in 1/300 inch.
    pub fn with_min_lineweight(&self, min_lineweight: Option<f64>) -> Self {
        Self { min_lineweight, ..self.clone() }
    }

    /// The minimum lineweight in mm, at least 0.05 mm; `None` if not set.
    pub fn min_lineweight_mm(&self) -> Option<f64> {
        self.min_lineweight
            .filter(|lw| *lw != 0.0)
            .map(|lw| (lw * 25.4 / 300.0).max(MIN_LINEWEIGHT_MM))
    }

    /// Copy with another minimum dash length.
    pub fn with_min_dash_length(&self, min_dash_length: f64) -> Self {
        Self { min_dash_length, ..self.clone() }
    }

    /// Copy with another flattening distance.
    pub fn with_max_flattening_distance(&self, max_flattening_distance: f64) -> Self {
        Self { max_flattening_distance, ..self.clone() }
    }

    /// Copy with another color policy; `custom_fg_color` is only replaced
    /// if given.
    pub fn with_color_policy(&self, color_policy: ColorPolicy, custom_fg_color: Option<Color>) -> Self {
        Self {
            color_policy,
            custom_fg_color: custom_fg_color.unwrap_or(self.custom_fg_color),
            ..self.clone()
        }
    }

    /// Copy with another background policy; `custom_bg_color` is only
    /// replaced if given.
    pub fn with_background_policy(&self, background_policy: BackgroundPolicy, custom_bg_color: Option<Color>) -> Self {
        Self {
            background_policy,
            custom_bg_color: custom_bg_color.unwrap_or(self.custom_bg_color),
            ..self.clone()
        }
    }

    /// Background color for a resolved layout `background`.
    pub fn background_color(&self, background: Color) -> Color {
        match self.background_policy {
            BackgroundPolicy::Default => background,
            BackgroundPolicy::White => Color::WHITE,
            BackgroundPolicy::Black => Color::BLACK,
            BackgroundPolicy::Off => Color::rgba(255, 255, 255, 0),
            BackgroundPolicy::Custom => self.custom_bg_color,
        }
    }
}

/// Map a lineweight in mm linear into the stroke width range, rounded to
/// 2 decimal places. Lineweights are clamped to the drawing range first.
pub fn map_lineweight_to_stroke_width(lineweight: f64, min_stroke_width: f64, max_stroke_width: f64) -> f64 {
    let lineweight = lineweight.clamp(MIN_LINEWEIGHT_MM, MAX_LINEWEIGHT_MM) - MIN_LINEWEIGHT_MM;
    let factor = (max_stroke_width - min_stroke_width) / (MAX_LINEWEIGHT_MM - MIN_LINEWEIGHT_MM);
    round_to(min_stroke_width + lineweight * factor, 2)
}
