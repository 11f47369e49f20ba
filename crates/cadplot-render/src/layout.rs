//! Page layout: page sizes, margins and the placement of the content on
//! the output page.

use cadplot_math::{Affine2, BoundingBox2d, Point2, Vec2};
use serde::{Deserialize, Serialize};

use crate::{RenderError, Result};

/// Page units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// 25.4 mm
    Inch,
    /// 1/96 inch
    Px,
    /// 1/72 inch
    Pt,
    /// Millimeters.
    #[default]
    Mm,
    /// Centimeters.
    Cm,
}

impl Units {
    /// Millimeters per unit.
    pub fn to_mm_factor(self) -> f64 {
        match self {
            Units::Inch => 25.4,
            Units::Px => 25.4 / 96.0,
            Units::Pt => 25.4 / 72.0,
            Units::Mm => 1.0,
            Units::Cm => 10.0,
        }
    }
}

/// Standard paper sizes in landscape orientation.
pub const PAGE_SIZES: &[(&str, f64, f64, Units)] = &[
    ("ISO A0", 1189.0, 841.0, Units::Mm),
    ("ISO A1", 841.0, 594.0, Units::Mm),
    ("ISO A2", 594.0, 420.0, Units::Mm),
    ("ISO A3", 420.0, 297.0, Units::Mm),
    ("ISO A4", 297.0, 210.0, Units::Mm),
    ("ANSI A", 11.0, 8.5, Units::Inch),
    ("ANSI B", 17.0, 11.0, Units::Inch),
    ("ANSI C", 22.0, 17.0, Units::Inch),
    ("ANSI D", 34.0, 22.0, Units::Inch),
    ("ANSI E", 44.0, 34.0, Units::Inch),
    ("ARCH C", 24.0, 18.0, Units::Inch),
    ("ARCH D", 36.0, 24.0, Units::Inch),
    ("ARCH E", 48.0, 36.0, Units::Inch),
    ("ARCH E1", 42.0, 30.0, Units::Inch),
    ("Letter", 11.0, 8.5, Units::Inch),
    ("Legal", 14.0, 8.5, Units::Inch),
];

/// Alignment of the content within the page margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum PageAlignment {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    #[default]
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl PageAlignment {
    fn is_center(self) -> bool {
        matches!(self, Self::TopCenter | Self::MiddleCenter | Self::BottomCenter)
    }

    fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::MiddleRight | Self::BottomRight)
    }

    fn is_middle(self) -> bool {
        matches!(self, Self::MiddleLeft | Self::MiddleCenter | Self::MiddleRight)
    }

    fn is_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomCenter | Self::BottomRight)
    }
}

/// Page margins in page units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    /// Margins from top, right, bottom and left.
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self { top, right, bottom, left }
    }

    /// Four equal margins.
    pub fn all(margin: f64) -> Self {
        Self::new(margin, margin, margin, margin)
    }

    /// Equal top-bottom and left-right margins.
    pub fn all2(top_bottom: f64, left_right: f64) -> Self {
        Self::new(top_bottom, left_right, top_bottom, left_right)
    }

    /// Margins scaled by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(
            self.top * factor,
            self.right * factor,
            self.bottom * factor,
            self.left * factor,
        )
    }
}

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (value * f).round() / f
}

/// Output page; a width or height of 0 is determined by the content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    /// Page width, 0 for auto-detect.
    pub width: f64,
    /// Page height, 0 for auto-detect.
    pub height: f64,
    /// Page units.
    pub units: Units,
    /// Page margins in page units.
    pub margins: Margins,
    /// Width limit for auto-detection, 0 for unlimited.
    pub max_width: f64,
    /// Height limit for auto-detection, 0 for unlimited.
    pub max_height: f64,
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0.0, 0.0, Units::Mm)
    }
}

impl Page {
    /// Page without margins and size limits.
    pub fn new(width: f64, height: f64, units: Units) -> Self {
        Self {
            width,
            height,
            units,
            margins: Margins::default(),
            max_width: 0.0,
            max_height: 0.0,
        }
    }

    /// A standard paper size in landscape orientation, e.g. "ISO A4".
    pub fn from_name(name: &str) -> Option<Self> {
        PAGE_SIZES
            .iter()
            .find(|(n, ..)| *n == name)
            .map(|&(_, width, height, units)| Self::new(width, height, units))
    }

    /// Copy with other margins.
    pub fn with_margins(&self, margins: Margins) -> Self {
        Self { margins, ..*self }
    }

    /// Page width in mm, rounded to 0.1 mm.
    pub fn width_in_mm(&self) -> f64 {
        round_to(self.width * self.units.to_mm_factor(), 1)
    }

    /// Page height in mm, rounded to 0.1 mm.
    pub fn height_in_mm(&self) -> f64 {
        round_to(self.height * self.units.to_mm_factor(), 1)
    }

    /// Width limit in mm, rounded to 0.1 mm.
    pub fn max_width_in_mm(&self) -> f64 {
        round_to(self.max_width * self.units.to_mm_factor(), 1)
    }

    /// Height limit in mm, rounded to 0.1 mm.
    pub fn max_height_in_mm(&self) -> f64 {
        round_to(self.max_height * self.units.to_mm_factor(), 1)
    }

    /// Margins in mm.
    pub fn margins_in_mm(&self) -> Margins {
        self.margins.scale(self.units.to_mm_factor())
    }

    /// Returns `true` for a landscape page, a square page is portrait.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Returns `true` for a portrait or square page.
    pub fn is_portrait(&self) -> bool {
        self.width <= self.height
    }

    /// Swap width and height of a portrait page.
    pub fn to_landscape(&mut self) {
        if self.is_portrait() {
            std::mem::swap(&mut self.width, &mut self.height);
        }
    }

    /// Swap width and height of a landscape page.
    pub fn to_portrait(&mut self) {
        if self.is_landscape() {
            std::mem::swap(&mut self.width, &mut self.height);
        }
    }

    /// Bottom-left and top-right corner of the area inside the margins in
    /// mm. The origin is the top-left page corner if `top_origin` is set,
    /// the bottom-left corner otherwise.
    pub fn margin_rect(&self, top_origin: bool) -> (Point2, Point2) {
        let margins = self.margins_in_mm();
        let right = self.width_in_mm() - margins.right;
        let height = self.height_in_mm();
        if top_origin {
            (
                Point2::new(margins.left, margins.top),
                Point2::new(right, height - margins.bottom),
            )
        } else {
            (
                Point2::new(margins.left, margins.bottom),
                Point2::new(right, height - margins.top),
            )
        }
    }
}

/// Layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Content rotation: 0, 90, 180 or 270 degrees.
    pub content_rotation: i32,
    /// Scale the content to fit the page.
    pub fit_page: bool,
    /// Drawing units to mm, e.g. 1:100 with meters is 10 / 1000 = 0.01.
    /// Ignored for fitted content, used to determine missing page sizes.
    pub scale: f64,
    /// Alignment of the content within the margins.
    pub page_alignment: PageAlignment,
    /// Crop the content at the page margins.
    pub crop_at_margins: bool,
    /// Relative lineweight policy: maximum stroke width as fraction of
    /// max(page width, page height).
    pub max_stroke_width: f64,
    /// Relative lineweight policy: minimum stroke width as fraction of
    /// `max_stroke_width`.
    pub min_stroke_width: f64,
    /// Fixed lineweight policy: stroke width as fraction of
    /// `max_stroke_width`.
    pub fixed_stroke_width: f64,
    /// Output coordinates range over [0, output_coordinate_space] for the
    /// larger page dimension.
    pub output_coordinate_space: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            content_rotation: 0,
            fit_page: true,
            scale: 1.0,
            page_alignment: PageAlignment::MiddleCenter,
            crop_at_margins: false,
            max_stroke_width: 0.001,
            min_stroke_width: 0.05,
            fixed_stroke_width: 0.15,
            output_coordinate_space: 1_000_000.0,
        }
    }
}

impl Settings {
    /// Parse a TOML document and validate it; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the content rotation.
    pub fn validate(&self) -> Result<()> {
        match self.content_rotation {
            0 | 90 | 180 | 270 => Ok(()),
            r => Err(RenderError::InvalidSettings(format!(
                "content rotation {r}, expected 0, 90, 180 or 270"
            ))),
        }
    }

    /// Page mm to output coordinates.
    pub fn page_output_scale_factor(&self, page: &Page) -> f64 {
        let size = page.width_in_mm().max(page.height_in_mm());
        if size == 0.0 {
            1.0
        } else {
            self.output_coordinate_space / size
        }
    }
}

/// Places a content box on an output page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    render_box: BoundingBox2d,
    flip_y: f64,
}

impl Layout {
    /// Layout for the content extents `render_box`; `flip_y` for outputs
    /// with a downward y-axis.
    pub fn new(render_box: BoundingBox2d, flip_y: bool) -> Self {
        Self {
            render_box,
            flip_y: if flip_y { -1.0 } else { 1.0 },
        }
    }

    /// Content rotation, 90 and 270 are swapped for a flipped y-axis.
    pub fn rotation(&self, settings: &Settings) -> Result<i32> {
        settings.validate()?;
        let rotation = settings.content_rotation;
        if self.flip_y < 0.0 {
            return Ok(match rotation {
                90 => 270,
                270 => 90,
                r => r,
            });
        }
        Ok(rotation)
    }

    /// Size of the content after rotation.
    pub fn content_size(&self, rotation: i32) -> Vec2 {
        let size = self.render_box.size();
        if rotation == 90 || rotation == 270 {
            Vec2::new(size.y, size.x)
        } else {
            size
        }
    }

    /// The page with missing sizes taken from the content, in mm.
    pub fn final_page(&self, page: &Page, settings: &Settings) -> Result<Page> {
        let rotation = self.rotation(settings)?;
        Ok(final_page_size(self.content_size(rotation), page, settings))
    }

    /// Matrix which places the content on `page`, which has to be the
    /// final page from [`Layout::final_page`].
    pub fn placement_matrix(&self, page: &Page, settings: &Settings, top_origin: bool) -> Result<Affine2> {
        let rotation = self.rotation(settings)?;
        let content_size = self.content_size(rotation);
        let mut content_size_mm = content_size * settings.scale;
        if settings.fit_page {
            content_size_mm *= fit_to_page(content_size_mm, page);
        }
        let scale_to_mm = if content_size.x == 0.0 {
            1.0
        } else {
            content_size_mm.x / content_size.x
        };
        let scale = scale_to_mm * settings.page_output_scale_factor(page);
        Ok(placement_matrix(
            &self.render_box,
            scale,
            scale * self.flip_y,
            rotation,
            page,
            settings,
            top_origin,
        ))
    }
}

/// Page in mm with missing width or height taken from the content size
/// and limited to the maximum page size.
pub fn final_page_size(content_size: Vec2, page: &Page, settings: &Settings) -> Page {
    let margins = page.margins_in_mm();
    let mut width = page.width_in_mm();
    let mut height = page.height_in_mm();
    if width == 0.0 {
        width = settings.scale * content_size.x + margins.left + margins.right;
    }
    if height == 0.0 {
        height = settings.scale * content_size.y + margins.top + margins.bottom;
    }
    let (width, height) = limit_page_size(width, height, page.max_width_in_mm(), page.max_height_in_mm());
    Page::new(round_to(width, 1), round_to(height, 1), Units::Mm).with_margins(margins)
}

/// Limit the page size, the aspect ratio is preserved; 0 is unlimited.
pub fn limit_page_size(width: f64, height: f64, max_width: f64, max_height: f64) -> (f64, f64) {
    if height == 0.0 {
        return (width, height);
    }
    let ar = width / height;
    let (mut width, mut height) = (width, height);
    if max_height != 0.0 {
        height = height.min(max_height);
        width = height * ar;
    }
    if max_width != 0.0 && width > max_width {
        width = max_width;
        height = width / ar;
    }
    (width, height)
}

/// Scale factor which fits the content into the page margins.
pub fn fit_to_page(content_size_mm: Vec2, page: &Page) -> f64 {
    if content_size_mm.x == 0.0 || content_size_mm.y == 0.0 {
        return 1.0;
    }
    let margins = page.margins_in_mm();
    let sx = (page.width_in_mm() - margins.left - margins.right) / content_size_mm.x;
    let sy = (page.height_in_mm() - margins.top - margins.bottom) / content_size_mm.y;
    sx.min(sy)
}

/// Matrix which scales and rotates `bbox`, shifts it into the first
/// quadrant and aligns it within the page margins.
pub fn placement_matrix(
    bbox: &BoundingBox2d,
    sx: f64,
    sy: f64,
    rotation: i32,
    page: &Page,
    settings: &Settings,
    top_origin: bool,
) -> Affine2 {
    let scale_mm_to_vb = settings.page_output_scale_factor(page);
    let margins = page.margins_in_mm();
    let sx = if sx.abs() < 1e-9 { 1.0 } else { sx };
    let sy = if sy.abs() < 1e-9 { 1.0 } else { sy };
    let mut m = Affine2::scale(sx, sy);
    if rotation != 0 {
        m = m.then(&Affine2::rotation_deg(rotation as f64));
    }
    let canvas = bbox.transformed(&m);
    let (origin, size) = if canvas.has_data() {
        (canvas.extmin, canvas.size())
    } else {
        (Point2::origin(), Vec2::zeros())
    };
    let dx = (page.width_in_mm() - margins.left - margins.right) * scale_mm_to_vb - size.x;
    let dy = (page.height_in_mm() - margins.top - margins.bottom) * scale_mm_to_vb - size.y;
    let mut offset_x = margins.left * scale_mm_to_vb;
    let mut offset_y = (if top_origin { margins.top } else { margins.bottom }) * scale_mm_to_vb;
    let alignment = settings.page_alignment;
    if alignment.is_center() {
        offset_x += dx / 2.0;
    } else if alignment.is_right() {
        offset_x += dx;
    }
    if alignment.is_middle() {
        offset_y += dy / 2.0;
    } else if alignment.is_bottom() == top_origin {
        offset_y += dy;
    }
    m.then(&Affine2::translation(offset_x - origin.x, offset_y - origin.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn settings(output_coordinate_space: f64) -> Settings {
        Settings {
            output_coordinate_space,
            ..Default::default()
        }
    }

    fn assert_maps(m: &Affine2, from: Point2, to: Point2) {
        let r = m.apply_point(&from);
        assert_relative_eq!(r.x, to.x, epsilon = 1e-9);
        assert_relative_eq!(r.y, to.y, epsilon = 1e-9);
    }

    #[test]
    fn test_page_in_mm() {
        let page = Page::from_name("ANSI A").unwrap();
        assert_eq!(page.width_in_mm(), 279.4);
        assert_eq!(page.height_in_mm(), 215.9);
        assert!(page.is_landscape());
        let mut page = page;
        page.to_portrait();
        assert_eq!(page.width, 8.5);
        assert!(Page::from_name("ISO B7").is_none());
    }

    #[test]
    fn test_margins() {
        assert_eq!(Margins::all2(1.0, 2.0), Margins::new(1.0, 2.0, 1.0, 2.0));
        let page = Page::new(10.0, 20.0, Units::Cm).with_margins(Margins::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(page.margins_in_mm(), Margins::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(page.margin_rect(true), (p(40.0, 10.0), p(80.0, 170.0)));
        assert_eq!(page.margin_rect(false), (p(40.0, 30.0), p(80.0, 190.0)));
    }

    #[test]
    fn test_invalid_rotation() {
        let settings = Settings {
            content_rotation: 45,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(RenderError::InvalidSettings(_))));
        let layout = Layout::new(BoundingBox2d::new(p(0.0, 0.0), p(1.0, 1.0)), false);
        assert!(layout.rotation(&settings).is_err());
    }

    #[test]
    fn test_flipped_rotation() {
        let layout = Layout::new(BoundingBox2d::new(p(0.0, 0.0), p(1.0, 1.0)), true);
        let settings = Settings {
            content_rotation: 90,
            ..Default::default()
        };
        assert_eq!(layout.rotation(&settings).unwrap(), 270);
    }

    #[test]
    fn test_final_page_size_from_content() {
        let page = Page::new(0.0, 0.0, Units::Mm).with_margins(Margins::all(10.0));
        let final_page = final_page_size(Vec2::new(100.0, 50.0), &page, &Settings::default());
        assert_eq!((final_page.width, final_page.height), (120.0, 70.0));
        let limited = Page { max_height: 35.0, ..page };
        let final_page = final_page_size(Vec2::new(100.0, 50.0), &limited, &Settings::default());
        assert_eq!((final_page.width, final_page.height), (60.0, 35.0));
    }

    #[test]
    fn test_placement_fits_page() {
        let layout = Layout::new(BoundingBox2d::new(p(0.0, 0.0), p(100.0, 50.0)), false);
        let page = Page::new(200.0, 100.0, Units::Mm);
        let m = layout.placement_matrix(&page, &settings(200.0), false).unwrap();
        assert_maps(&m, p(0.0, 0.0), p(0.0, 0.0));
        assert_maps(&m, p(100.0, 50.0), p(200.0, 100.0));
    }

    #[test]
    fn test_placement_flipped_y() {
        let layout = Layout::new(BoundingBox2d::new(p(0.0, 0.0), p(100.0, 50.0)), true);
        let page = Page::new(200.0, 100.0, Units::Mm);
        let m = layout.placement_matrix(&page, &settings(200.0), true).unwrap();
        assert_maps(&m, p(0.0, 0.0), p(0.0, 100.0));
        assert_maps(&m, p(100.0, 50.0), p(200.0, 0.0));
    }

    #[test]
    fn test_placement_alignment() {
        let layout = Layout::new(BoundingBox2d::new(p(0.0, 0.0), p(100.0, 50.0)), false);
        let page = Page::new(300.0, 100.0, Units::Mm);
        let mut s = settings(300.0);
        let m = layout.placement_matrix(&page, &s, false).unwrap();
        assert_maps(&m, p(0.0, 0.0), p(50.0, 0.0));
        s.page_alignment = PageAlignment::TopLeft;
        let m = layout.placement_matrix(&page, &s, false).unwrap();
        assert_maps(&m, p(0.0, 0.0), p(0.0, 0.0));
        s.page_alignment = PageAlignment::BottomRight;
        let m = layout.placement_matrix(&page, &s, false).unwrap();
        assert_maps(&m, p(0.0, 0.0), p(100.0, 0.0));
    }

    #[test]
    fn test_placement_rotated() {
        let layout = Layout::new(BoundingBox2d::new(p(0.0, 0.0), p(100.0, 50.0)), false);
        let page = Page::new(100.0, 200.0, Units::Mm);
        let s = Settings {
            content_rotation: 90,
            ..settings(200.0)
        };
        let m = layout.placement_matrix(&page, &s, false).unwrap();
        // rotated content is 100 x 200 after fitting
        assert_maps(&m, p(0.0, 0.0), p(100.0, 0.0));
        assert_maps(&m, p(100.0, 50.0), p(0.0, 200.0));
    }

    #[test]
    fn test_settings_from_toml() {
        let s = Settings::from_toml_str("content_rotation = 180\npage_alignment = \"top_left\"").unwrap();
        assert_eq!(s.content_rotation, 180);
        assert_eq!(s.page_alignment, PageAlignment::TopLeft);
        assert_eq!(s.output_coordinate_space, 1_000_000.0);
    }

    #[test]
    fn test_settings_from_toml_rejects_rotation() {
        assert!(matches!(
            Settings::from_toml_str("content_rotation = 45"),
            Err(RenderError::InvalidSettings(_))
        ));
    }
}
