//! Resolved visual properties.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::color::{Color, DARK_LUMINANCE};

/// Name of the continuous linetype.
pub const CONTINUOUS: &str = "CONTINUOUS";

/// Default lineweight in mm.
pub const DEFAULT_LINEWEIGHT: f64 = 0.25;

/// Resolved properties of a drawing primitive as consumed by the pipeline
/// stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// True color.
    pub color: Color,
    /// Lineweight in mm.
    pub lineweight: f64,
    /// Layer name.
    pub layer: String,
    /// Pen index for plotters.
    pub pen: i32,
    /// Owner handle, empty if unknown.
    pub handle: String,
    /// Upper case linetype name.
    pub linetype_name: String,
    /// Simplified linetype pattern: alternating dash and gap lengths,
    /// empty for continuous lines.
    pub linetype_pattern: Vec<f64>,
    /// Linetype scale of the primitive including the document scale.
    pub linetype_scale: f64,
    /// Visibility.
    pub is_visible: bool,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            lineweight: DEFAULT_LINEWEIGHT,
            layer: "0".to_string(),
            pen: 0,
            handle: String::new(),
            linetype_name: CONTINUOUS.to_string(),
            linetype_pattern: Vec::new(),
            linetype_scale: 1.0,
            is_visible: true,
        }
    }
}

/// The minimal visual attributes a backend needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendProperties {
    /// Mapped color.
    pub color: Color,
    /// Lineweight in mm.
    pub lineweight: f64,
    /// Layer name.
    pub layer: String,
    /// Pen index.
    pub pen: i32,
    /// Owner handle, empty if unknown.
    pub handle: String,
}

impl Default for BackendProperties {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            lineweight: DEFAULT_LINEWEIGHT,
            layer: "0".to_string(),
            pen: 0,
            handle: String::new(),
        }
    }
}

impl BackendProperties {
    /// Structural hash of color, lineweight, layer and pen; the handle is
    /// not part of the hash.
    pub fn property_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.color.hash(&mut hasher);
        self.lineweight.to_bits().hash(&mut hasher);
        self.layer.hash(&mut hasher);
        self.pen.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns `true` if both share color, lineweight, layer and pen.
    pub fn same_style(&self, other: &BackendProperties) -> bool {
        self.color == other.color
            && self.lineweight == other.lineweight
            && self.layer == other.layer
            && self.pen == other.pen
    }
}

/// Layer table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerProperties {
    /// Real layer name, mixed case.
    pub layer: String,
    /// True color of the layer.
    pub color: Color,
    /// The layer uses ACI color 7, which follows the layout background.
    pub has_aci_color_7: bool,
    /// Upper case linetype name.
    pub linetype_name: String,
    /// Simplified linetype pattern.
    pub linetype_pattern: Vec<f64>,
    /// Lineweight in mm.
    pub lineweight: f64,
    /// Layer is switched on.
    pub is_on: bool,
    /// Layer is frozen.
    pub is_frozen: bool,
    /// Layer is plotted on export.
    pub plot: bool,
}

impl LayerProperties {
    /// A visible, plottable layer with continuous linetype and the default
    /// lineweight.
    pub fn new(layer: impl Into<String>, color: Color) -> Self {
        Self {
            layer: layer.into(),
            color,
            has_aci_color_7: false,
            linetype_name: CONTINUOUS.to_string(),
            linetype_pattern: Vec::new(),
            lineweight: DEFAULT_LINEWEIGHT,
            is_on: true,
            is_frozen: false,
            plot: true,
        }
    }

    /// Visibility of the layer; in export mode no-plot layers are hidden.
    pub fn is_visible(&self, export_mode: bool) -> bool {
        self.is_on && !self.is_frozen && (!export_mode || self.plot)
    }

    /// Entity color for BYLAYER entities; ACI 7 layers follow the layout
    /// foreground color.
    pub fn entity_color(&self, default_color: Color) -> Color {
        if self.has_aci_color_7 {
            default_color
        } else {
            self.color
        }
    }
}

impl Default for LayerProperties {
    fn default() -> Self {
        let mut layer = Self::new("0", Color::WHITE);
        layer.has_aci_color_7 = true;
        layer
    }
}

/// Model space background color.
pub const MODEL_SPACE_BG_COLOR: Color = Color::rgb(0x21, 0x28, 0x30);
/// Paper space background color.
pub const PAPER_SPACE_BG_COLOR: Color = Color::WHITE;

/// Layout wide colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutProperties {
    /// Layout name.
    pub name: String,
    background_color: Color,
    default_color: Color,
    has_dark_background: bool,
}

impl LayoutProperties {
    /// Layout with `background` and an optional foreground color; without
    /// a foreground the default color is white on dark backgrounds and
    /// black otherwise.
    pub fn new(name: impl Into<String>, background: Color, foreground: Option<Color>) -> Self {
        let mut layout = Self {
            name: name.into(),
            background_color: background,
            default_color: Color::BLACK,
            has_dark_background: false,
        };
        layout.set_colors(background, foreground);
        layout
    }

    /// Model space layout properties.
    pub fn modelspace() -> Self {
        Self::new("Model", MODEL_SPACE_BG_COLOR, None)
    }

    /// Paper space layout properties.
    pub fn paperspace(name: impl Into<String>) -> Self {
        Self::new(name, PAPER_SPACE_BG_COLOR, None)
    }

    /// Replace the layout colors.
    pub fn set_colors(&mut self, background: Color, foreground: Option<Color>) {
        self.background_color = background;
        self.has_dark_background = background.with_alpha(255).is_dark(DARK_LUMINANCE);
        self.default_color = foreground.unwrap_or(if self.has_dark_background {
            Color::WHITE
        } else {
            Color::BLACK
        });
    }

    /// Background color.
    pub fn background_color(&self) -> Color {
        self.background_color
    }

    /// Default foreground color.
    pub fn default_color(&self) -> Color {
        self.default_color
    }

    /// Returns `true` for a dark background.
    pub fn has_dark_background(&self) -> bool {
        self.has_dark_background
    }
}

impl Default for LayoutProperties {
    fn default() -> Self {
        Self::modelspace()
    }
}
