//! Pen table of the plot header.

use std::collections::BTreeMap;

use log::warn;

/// Pen used for colors which differ from the color of the requested pen.
pub const DEFAULT_PEN: i32 = 0;

/// Capacity of the pen table.
pub const MAX_PENS: i32 = 256;

/// An RGB pen color.
pub type Rgb = (u8, u8, u8);

/// Pen numbers and their colors, written as `NP` and `PC` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenTable {
    max_pens: i32,
    pens: BTreeMap<i32, Rgb>,
}

impl Default for PenTable {
    fn default() -> Self {
        Self::new(MAX_PENS)
    }
}

impl PenTable {
    /// Empty table for pens `0..max_pens`.
    pub fn new(max_pens: i32) -> Self {
        Self {
            max_pens: max_pens.max(1),
            pens: BTreeMap::new(),
        }
    }

    /// Count of defined pens.
    pub fn len(&self) -> usize {
        self.pens.len()
    }

    /// Returns `true` if no pen is defined.
    pub fn is_empty(&self) -> bool {
        self.pens.is_empty()
    }

    /// Returns `true` if `pen` is defined.
    pub fn contains(&self, pen: i32) -> bool {
        self.pens.contains_key(&pen)
    }

    /// Color of `pen`.
    pub fn get(&self, pen: i32) -> Option<Rgb> {
        self.pens.get(&pen).copied()
    }

    /// Returns `true` if `pen` fits into the table.
    pub fn is_valid_pen(&self, pen: i32) -> bool {
        (0..self.max_pens).contains(&pen)
    }

    /// Define or redefine `pen`. Pens outside of the table are ignored.
    pub fn add_pen(&mut self, pen: i32, rgb: Rgb) {
        if !self.is_valid_pen(pen) {
            warn!("pen {pen} exceeds the pen table of {} pens", self.max_pens);
            return;
        }
        self.pens.insert(pen, rgb);
    }

    /// `NP` command for the table size followed by a `PC` command per pen
    /// in ascending pen order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = format!("NP{};", self.max_pens - 1);
        for (&pen, &rgb) in &self.pens {
            data.push_str(&pen_color_command(pen, rgb));
        }
        data.into_bytes()
    }
}

/// `PC` command to set the color of `pen`.
pub fn pen_color_command(pen: i32, (r, g, b): Rgb) -> String {
    format!("PC{pen},{r},{g},{b};")
}
