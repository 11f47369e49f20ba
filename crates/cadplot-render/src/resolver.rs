//! Property resolution: source attributes to [`Properties`].
//!
//! Every attribute resolves independently through the chain entity,
//! block reference, layer and layout default. Block references nest by
//! [`RenderContext::push_state`] and [`RenderContext::pop_state`].

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::color::{aci_to_color, Color};
use crate::properties::{LayerProperties, LayoutProperties, Properties, CONTINUOUS, DEFAULT_LINEWEIGHT};
use crate::{RenderError, Result};

/// Smallest resolved lineweight in mm.
pub const MIN_LINEWEIGHT: f64 = 0.01;

/// Color attribute of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorValue {
    /// Color of the layer.
    #[default]
    ByLayer,
    /// Color of the enclosing block reference.
    ByBlock,
    /// AutoCAD Color Index 1..=255; 7 is black or white depending on the
    /// background.
    Aci(u8),
    /// True color, overrides any color index.
    True(Color),
}

/// Lineweight attribute of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineweightValue {
    /// Lineweight of the layer.
    #[default]
    ByLayer,
    /// Lineweight of the enclosing block reference.
    ByBlock,
    /// Document default lineweight.
    Default,
    /// Lineweight in 1/100 mm.
    Explicit(i16),
}

/// Linetype attribute of a primitive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinetypeValue {
    /// Linetype of the layer.
    #[default]
    ByLayer,
    /// Linetype of the enclosing block reference.
    ByBlock,
    /// Linetype by name.
    Named(String),
}

/// Raw attributes of a primitive as supplied by the document traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttributes {
    /// Color.
    pub color: ColorValue,
    /// Transparency, 0 is opaque and 1 fully transparent.
    pub transparency: f64,
    /// Lineweight.
    pub lineweight: LineweightValue,
    /// Linetype.
    pub linetype: LinetypeValue,
    /// Linetype scale of the primitive.
    pub linetype_scale: f64,
    /// Layer name.
    pub layer: String,
    /// Invisible flag.
    pub invisible: bool,
    /// Owner handle.
    pub handle: String,
    /// Plotter pen index.
    pub pen: i32,
}

impl Default for SourceAttributes {
    fn default() -> Self {
        Self {
            color: ColorValue::ByLayer,
            transparency: 0.0,
            lineweight: LineweightValue::ByLayer,
            linetype: LinetypeValue::ByLayer,
            linetype_scale: 1.0,
            layer: "0".to_string(),
            invisible: false,
            handle: String::new(),
            pen: 0,
        }
    }
}

fn layer_key(name: &str) -> String {
    name.to_lowercase()
}

/// Resolution context: layer and linetype tables, the current layout and
/// the block reference state stack.
#[derive(Debug, Clone)]
pub struct RenderContext {
    layers: HashMap<String, LayerProperties>,
    linetypes: HashMap<String, Vec<f64>>,
    layout: LayoutProperties,
    default_layer: LayerProperties,
    /// Document wide linetype scale.
    pub linetype_scale: f64,
    /// Hide no-plot layers.
    pub export_mode: bool,
    current_block_reference: Option<Properties>,
    saved_states: Vec<Option<Properties>>,
}

impl RenderContext {
    /// Empty context for the model space.
    pub fn new() -> Self {
        Self {
            layers: HashMap::new(),
            linetypes: HashMap::new(),
            layout: LayoutProperties::modelspace(),
            default_layer: LayerProperties::default(),
            linetype_scale: 1.0,
            export_mode: false,
            current_block_reference: None,
            saved_states: Vec::new(),
        }
    }

    /// Add or replace a layer, layer names are case insensitive.
    pub fn add_layer(&mut self, layer: LayerProperties) {
        self.layers.insert(layer_key(&layer.layer), layer);
    }

    /// Layer by case insensitive name.
    pub fn layer(&self, name: &str) -> Option<&LayerProperties> {
        self.layers.get(&layer_key(name))
    }

    /// Add or replace a linetype pattern, names are case insensitive.
    pub fn add_linetype(&mut self, name: &str, pattern: Vec<f64>) {
        self.linetypes.insert(name.to_uppercase(), pattern);
    }

    /// Switch `layers` on and all others off, or with `state == false`
    /// the other way around.
    pub fn set_layers_state(&mut self, layers: &[&str], state: bool) {
        let keys: Vec<String> = layers.iter().map(|name| layer_key(name)).collect();
        for (key, layer) in self.layers.iter_mut() {
            layer.is_on = if keys.contains(key) { state } else { !state };
        }
    }

    /// Replace the current layout.
    pub fn set_current_layout(&mut self, layout: LayoutProperties) {
        self.layout = layout;
    }

    /// The current layout.
    pub fn layout(&self) -> &LayoutProperties {
        &self.layout
    }

    /// Returns `true` while resolving the content of a block reference.
    pub fn inside_block_reference(&self) -> bool {
        self.current_block_reference.is_some()
    }

    /// Enter a block reference with its resolved properties.
    pub fn push_state(&mut self, block_reference: Properties) {
        let saved = self.current_block_reference.replace(block_reference);
        self.saved_states.push(saved);
    }

    /// Leave the current block reference.
    pub fn pop_state(&mut self) {
        match self.saved_states.pop() {
            Some(saved) => self.current_block_reference = saved,
            None => warn!("pop_state() without matching push_state()"),
        }
    }

    /// Number of entered block references.
    pub fn depth(&self) -> usize {
        self.saved_states.len()
    }

    /// Fails if block reference states are still on the stack.
    pub fn verify_balanced(&self) -> Result<()> {
        match self.depth() {
            0 => Ok(()),
            depth => Err(RenderError::UnbalancedState(depth)),
        }
    }

    /// Resolve all properties of a primitive.
    pub fn resolve_all(&self, source: &SourceAttributes) -> Properties {
        let layer = self.resolve_layer(source);
        let (linetype_name, linetype_pattern) = self.resolve_linetype(source, &layer);
        Properties {
            color: self.resolve_color(source, &layer),
            lineweight: self.resolve_lineweight(source, &layer),
            pen: source.pen,
            handle: source.handle.clone(),
            linetype_name,
            linetype_pattern,
            linetype_scale: self.resolve_linetype_scale(source),
            is_visible: self.resolve_visible(source, &layer),
            layer,
        }
    }

    /// Layer "0" inside a block reference is the layer of the block
    /// reference.
    pub fn resolve_layer(&self, source: &SourceAttributes) -> String {
        match &self.current_block_reference {
            Some(block) if source.layer == "0" => block.layer.clone(),
            _ => source.layer.clone(),
        }
    }

    fn layer_or_default(&self, layer: &str) -> &LayerProperties {
        self.layer(layer).unwrap_or(&self.default_layer)
    }

    /// Resolve the true color including the alpha channel from the
    /// transparency.
    pub fn resolve_color(&self, source: &SourceAttributes, layer: &str) -> Color {
        let color = match source.color {
            ColorValue::True(color) => color,
            ColorValue::ByLayer => self.layer_or_default(layer).entity_color(self.layout.default_color()),
            ColorValue::ByBlock => match &self.current_block_reference {
                Some(block) => block.color,
                None => self.layout.default_color(),
            },
            ColorValue::Aci(aci) => self.aci_to_true_color(aci),
        };
        let alpha = ((1.0 - source.transparency.clamp(0.0, 1.0)) * 255.0).round() as u8;
        if alpha == 255 {
            color
        } else {
            color.with_alpha(alpha)
        }
    }

    /// True color of an ACI index; 7 depends on the background, invalid
    /// indices resolve to the layout foreground.
    pub fn aci_to_true_color(&self, aci: u8) -> Color {
        match aci {
            7 if self.layout.has_dark_background() => Color::WHITE,
            7 => Color::BLACK,
            1..=255 => aci_to_color(aci),
            _ => self.layout.default_color(),
        }
    }

    /// Resolve the upper case linetype name and pattern. Unknown names
    /// resolve to a continuous pattern.
    pub fn resolve_linetype(&self, source: &SourceAttributes, layer: &str) -> (String, Vec<f64>) {
        match &source.linetype {
            LinetypeValue::ByLayer => {
                let layer = self.layer_or_default(layer);
                (layer.linetype_name.clone(), layer.linetype_pattern.clone())
            }
            LinetypeValue::ByBlock => match &self.current_block_reference {
                Some(block) => (block.linetype_name.clone(), block.linetype_pattern.clone()),
                None => ("STANDARD".to_string(), Vec::new()),
            },
            LinetypeValue::Named(name) => {
                let name = name.to_uppercase();
                let pattern = match self.linetypes.get(&name) {
                    Some(pattern) => pattern.clone(),
                    None => {
                        if name != CONTINUOUS {
                            warn!("unknown linetype {name:?}, drawing continuous lines");
                        }
                        Vec::new()
                    }
                };
                (name, pattern)
            }
        }
    }

    /// Resolve the lineweight in mm, at least [`MIN_LINEWEIGHT`].
    pub fn resolve_lineweight(&self, source: &SourceAttributes, layer: &str) -> f64 {
        let lineweight = match source.lineweight {
            LineweightValue::ByLayer => self.layer_or_default(layer).lineweight,
            LineweightValue::ByBlock => match &self.current_block_reference {
                Some(block) => block.lineweight,
                None => DEFAULT_LINEWEIGHT,
            },
            LineweightValue::Default => DEFAULT_LINEWEIGHT,
            LineweightValue::Explicit(value) if value < 0 => DEFAULT_LINEWEIGHT,
            LineweightValue::Explicit(value) => value as f64 / 100.0,
        };
        lineweight.max(MIN_LINEWEIGHT)
    }

    /// Primitive linetype scale times the document linetype scale.
    pub fn resolve_linetype_scale(&self, source: &SourceAttributes) -> f64 {
        source.linetype_scale * self.linetype_scale
    }

    /// A primitive is visible if it is not flagged invisible and its layer
    /// is on, not frozen and, in export mode, plottable.
    pub fn resolve_visible(&self, source: &SourceAttributes, layer: &str) -> bool {
        if source.invisible {
            return false;
        }
        match self.layer(layer) {
            Some(layer) => layer.is_visible(self.export_mode),
            None => true,
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RenderContext {
        let mut ctx = RenderContext::new();
        let mut walls = LayerProperties::new("Walls", Color::rgb(255, 0, 0));
        walls.lineweight = 0.5;
        walls.linetype_name = "DASHED".into();
        walls.linetype_pattern = vec![0.5, 0.25];
        ctx.add_layer(walls);
        ctx.add_linetype("dashdot", vec![1.0, 0.2, 0.0, 0.2]);
        ctx
    }

    fn on_layer(layer: &str) -> SourceAttributes {
        SourceAttributes {
            layer: layer.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_by_layer_resolution() {
        let ctx = context();
        let p = ctx.resolve_all(&on_layer("WALLS"));
        assert_eq!(p.color, Color::rgb(255, 0, 0));
        assert_eq!(p.lineweight, 0.5);
        assert_eq!(p.linetype_name, "DASHED");
        assert_eq!(p.linetype_pattern, vec![0.5, 0.25]);
        assert!(p.is_visible);
    }

    #[test]
    fn test_attributes_resolve_independently() {
        let ctx = context();
        let source = SourceAttributes {
            lineweight: LineweightValue::Explicit(13),
            linetype: LinetypeValue::Named("DashDot".into()),
            ..on_layer("walls")
        };
        let p = ctx.resolve_all(&source);
        assert_eq!(p.color, Color::rgb(255, 0, 0));
        assert_eq!(p.lineweight, 0.13);
        assert_eq!(p.linetype_name, "DASHDOT");
        assert_eq!(p.linetype_pattern.len(), 4);
    }

    #[test]
    fn test_lineweight_values() {
        let ctx = context();
        let lw = |value| {
            let source = SourceAttributes {
                lineweight: value,
                ..Default::default()
            };
            ctx.resolve_lineweight(&source, "0")
        };
        assert_eq!(lw(LineweightValue::Default), 0.25);
        assert_eq!(lw(LineweightValue::Explicit(0)), 0.01);
        assert_eq!(lw(LineweightValue::Explicit(211)), 2.11);
        assert_eq!(lw(LineweightValue::ByBlock), 0.25);
    }

    #[test]
    fn test_aci_7_and_transparency() {
        let mut ctx = context();
        let source = SourceAttributes {
            color: ColorValue::Aci(7),
            transparency: 0.5,
            ..Default::default()
        };
        // model space background is dark
        assert_eq!(ctx.resolve_color(&source, "0"), Color::rgba(255, 255, 255, 128));
        ctx.set_current_layout(LayoutProperties::paperspace("Layout1"));
        assert_eq!(ctx.resolve_color(&source, "0").to_rgb(), (0, 0, 0));
        assert_eq!(ctx.aci_to_true_color(0), Color::BLACK);
    }

    #[test]
    fn test_block_reference_inheritance() {
        let mut ctx = context();
        let block = Properties {
            layer: "Walls".into(),
            color: Color::rgb(0, 0, 255),
            lineweight: 0.7,
            ..Default::default()
        };
        ctx.push_state(block);
        let source = SourceAttributes {
            color: ColorValue::ByBlock,
            lineweight: LineweightValue::ByBlock,
            ..Default::default()
        };
        let p = ctx.resolve_all(&source);
        assert_eq!(p.layer, "Walls");
        assert_eq!(p.color, Color::rgb(0, 0, 255));
        assert_eq!(p.lineweight, 0.7);
        assert!(matches!(ctx.verify_balanced(), Err(RenderError::UnbalancedState(1))));
        ctx.pop_state();
        assert!(ctx.verify_balanced().is_ok());
        assert_eq!(ctx.resolve_layer(&source), "0");
    }

    #[test]
    fn test_nested_states_restore() {
        let mut ctx = context();
        ctx.push_state(Properties {
            layer: "A".into(),
            ..Default::default()
        });
        ctx.push_state(Properties {
            layer: "B".into(),
            ..Default::default()
        });
        assert_eq!(ctx.resolve_layer(&on_layer("0")), "B");
        ctx.pop_state();
        assert_eq!(ctx.resolve_layer(&on_layer("0")), "A");
        ctx.pop_state();
        ctx.pop_state();
        assert!(!ctx.inside_block_reference());
    }

    #[test]
    fn test_visibility_vetoes() {
        let mut ctx = context();
        let mut hidden = LayerProperties::new("NoPlot", Color::WHITE);
        hidden.plot = false;
        ctx.add_layer(hidden);
        assert!(ctx.resolve_all(&on_layer("noplot")).is_visible);
        ctx.export_mode = true;
        assert!(!ctx.resolve_all(&on_layer("noplot")).is_visible);
        let invisible = SourceAttributes {
            invisible: true,
            ..on_layer("walls")
        };
        assert!(!ctx.resolve_all(&invisible).is_visible);
        ctx.set_layers_state(&["NoPlot"], false);
        assert!(ctx.resolve_all(&on_layer("walls")).is_visible);
        assert!(!ctx.layer("noplot").unwrap().is_on);
    }
}
