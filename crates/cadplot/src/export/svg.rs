//! Native SVG backend.
//!
//! The [`SvgBackend`] records the drawing. Exporting maps the recording
//! into an integer view box in the first quadrant, the page origin in the
//! top-left corner, and replays it into a renderer which writes compact
//! path elements styled by deduplicated CSS classes.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use cadplot_geom::{Path2d, PathElement, Points2d};
use cadplot_math::{BoundingBox2d, Point2};
use cadplot_render::{
    map_lineweight_to_stroke_width, Backend, BackendProperties, Color, Configuration, ImageData, Layout,
    LineweightPolicy, Page, PixelBuffer, Player, Recorder, Settings, MIN_LINEWEIGHT_MM,
};
use log::{debug, warn};

use crate::{CadError, Result};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Backend which records a drawing and exports it as SVG document.
#[derive(Debug, Default)]
pub struct SvgBackend {
    recorder: Recorder,
}

impl SvgBackend {
    /// Empty SVG backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded drawing.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// SVG document of the recording; `render_box` selects the region to
    /// render, the content extents by default.
    pub fn get_string(&self, page: &Page, settings: &Settings, render_box: Option<BoundingBox2d>) -> Result<String> {
        render_svg(self.recorder.player(), page, settings, render_box)
    }
}

cadplot_render::delegate_backend!(SvgBackend, recorder);

/// SVG document of `player`; the player is placed on the page and consumed.
///
/// An empty page gives a bare `<svg>` element.
pub fn render_svg(
    mut player: Player,
    page: &Page,
    settings: &Settings,
    render_box: Option<BoundingBox2d>,
) -> Result<String> {
    let render_box = render_box.unwrap_or_else(|| player.bbox());
    let layout = Layout::new(render_box, true);
    let page = layout.final_page(page, settings)?;
    if page.width == 0.0 || page.height == 0.0 {
        return Ok(format!("<svg xmlns=\"{SVG_NAMESPACE}\" />"));
    }
    let m = layout.placement_matrix(&page, settings, true)?;
    player.transform(&m);
    if settings.crop_at_margins {
        let (p1, p2) = page.margin_rect(true);
        let output_scale = settings.page_output_scale_factor(&page);
        // curve approximation 0.1 mm
        player.crop_rect(p1 * output_scale, p2 * output_scale, 0.1 * output_scale);
    }
    let mut renderer = SvgRenderer::new(&page, settings);
    player.replay(&mut renderer, None)?;
    debug!(
        "svg: {} style classes, {} filled and {} stroked elements",
        renderer.styles.len(),
        renderer.fill_count,
        renderer.stroke_count
    );
    Ok(renderer.into_string())
}

/// Integer view box fitted to the aspect ratio of `page`; the larger page
/// dimension spans `output_coordinate_space`.
pub fn make_view_box(page: &Page, output_coordinate_space: f64) -> (i64, i64) {
    let size = output_coordinate_space.round() as i64;
    if page.width > page.height {
        (size, (size as f64 * page.height / page.width).round() as i64)
    } else {
        ((size as f64 * page.width / page.height).round() as i64, size)
    }
}

/// CSS classes for distinct styles, named `C1`, `C2`, ... in hex.
#[derive(Debug, Default)]
struct Styles {
    class_names: HashMap<String, String>,
    definitions: Vec<String>,
}

impl Styles {
    fn len(&self) -> usize {
        self.definitions.len()
    }

    fn get_class(&mut self, style: Style) -> String {
        let style = style.to_css();
        if let Some(name) = self.class_names.get(&style) {
            return name.clone();
        }
        let name = format!("C{:X}", self.definitions.len() + 1);
        self.definitions.push(format!(".{name} {style}"));
        self.class_names.insert(style, name.clone());
        name
    }
}

struct Style {
    stroke: String,
    stroke_width: Option<i64>,
    stroke_opacity: f64,
    fill: String,
    fill_opacity: f64,
}

impl Style {
    fn stroke(color: Color, width: i64) -> Self {
        Self {
            stroke: color.rgb_hex(),
            stroke_width: Some(width),
            stroke_opacity: color.opacity(),
            fill: "none".into(),
            fill_opacity: 1.0,
        }
    }

    fn fill(color: Color) -> Self {
        Self {
            stroke: "none".into(),
            stroke_width: None,
            stroke_opacity: 1.0,
            fill: color.rgb_hex(),
            fill_opacity: color.opacity(),
        }
    }

    fn to_css(&self) -> String {
        let stroke_width = match self.stroke_width {
            Some(width) => width.to_string(),
            None => "none".into(),
        };
        format!(
            "{{stroke: {}; stroke-width: {}; stroke-opacity: {:.3}; fill: {}; fill-opacity: {:.3};}}",
            self.stroke, stroke_width, self.stroke_opacity, self.fill, self.fill_opacity
        )
    }
}

/// Writes SVG elements for replayed primitives in view box coordinates.
#[derive(Debug)]
struct SvgRenderer {
    width_mm: f64,
    height_mm: f64,
    view_box: (i64, i64),
    background: Color,
    styles: Styles,
    fills: String,
    strokes: String,
    fill_count: usize,
    stroke_count: usize,
    stroke_width_cache: HashMap<u64, i64>,
    stroke_width_scale: f64,
    lineweight_policy: LineweightPolicy,
    min_lineweight: f64,
    lineweight_scaling: f64,
    max_stroke_width: f64,
    min_stroke_width: f64,
    fixed_stroke_width: f64,
}

impl SvgRenderer {
    fn new(page: &Page, settings: &Settings) -> Self {
        let view_box = make_view_box(page, settings.output_coordinate_space);
        let max_stroke_width = (settings.output_coordinate_space * settings.max_stroke_width).trunc();
        Self {
            width_mm: page.width_in_mm(),
            height_mm: page.height_in_mm(),
            view_box,
            background: Color::WHITE,
            styles: Styles::default(),
            fills: String::new(),
            strokes: String::new(),
            fill_count: 0,
            stroke_count: 0,
            stroke_width_cache: HashMap::new(),
            stroke_width_scale: view_box.0 as f64 / page.width_in_mm(),
            lineweight_policy: LineweightPolicy::Absolute,
            min_lineweight: MIN_LINEWEIGHT_MM,
            lineweight_scaling: 1.0,
            max_stroke_width,
            min_stroke_width: (max_stroke_width * settings.min_stroke_width).trunc(),
            fixed_stroke_width: (max_stroke_width * settings.fixed_stroke_width).trunc(),
        }
    }

    fn into_string(self) -> String {
        let (width, height) = self.view_box;
        let mut svg = format!(
            "<svg xmlns=\"{SVG_NAMESPACE}\" width=\"{}mm\" height=\"{}mm\" viewBox=\"0 0 {width} {height}\">",
            self.width_mm, self.height_mm
        );
        if !self.styles.definitions.is_empty() {
            let _ = write!(svg, "<defs><style>{}</style></defs>", self.styles.definitions.join("\n"));
        }
        let _ = write!(
            svg,
            "<rect fill=\"{}\" fill-opacity=\"{:.3}\" x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" />",
            self.background.rgb_hex(),
            self.background.opacity()
        );
        let _ = write!(svg, "<g fill-rule=\"evenodd\" stroke=\"none\">{}</g>", self.fills);
        let _ = write!(
            svg,
            "<g stroke-linecap=\"round\" stroke-linejoin=\"round\" fill=\"none\">{}</g>",
            self.strokes
        );
        svg.push_str("</svg>");
        svg
    }

    fn add_strokes(&mut self, d: &str, properties: &BackendProperties) {
        if d.is_empty() {
            return;
        }
        let width = self.resolve_stroke_width(properties.lineweight);
        let class = self.styles.get_class(Style::stroke(properties.color, width));
        let _ = write!(self.strokes, "<path d=\"{d}\" class=\"{class}\" />");
        self.stroke_count += 1;
    }

    fn add_filling(&mut self, d: &str, properties: &BackendProperties) {
        if d.is_empty() {
            return;
        }
        let class = self.styles.get_class(Style::fill(properties.color));
        let _ = write!(self.fills, "<path d=\"{d}\" class=\"{class}\" />");
        self.fill_count += 1;
    }

    fn resolve_stroke_width(&mut self, lineweight: f64) -> i64 {
        let key = lineweight.to_bits();
        if let Some(width) = self.stroke_width_cache.get(&key) {
            return *width;
        }
        let width = match self.lineweight_policy {
            LineweightPolicy::Absolute => {
                let width = if self.lineweight_scaling != 0.0 {
                    self.min_lineweight.max(lineweight) * self.lineweight_scaling
                } else {
                    self.min_lineweight
                };
                (width * self.stroke_width_scale).round()
            }
            LineweightPolicy::Relative => {
                map_lineweight_to_stroke_width(lineweight, self.min_stroke_width, self.max_stroke_width).round()
            }
            LineweightPolicy::RelativeFixed => self.fixed_stroke_width,
        };
        let width = width as i64;
        self.stroke_width_cache.insert(key, width);
        width
    }
}

impl Backend for SvgRenderer {
    fn configure(&mut self, config: &Configuration) {
        self.lineweight_policy = config.lineweight_policy;
        if let Some(min_lineweight) = config.min_lineweight_mm() {
            self.min_lineweight = min_lineweight;
        }
        self.lineweight_scaling = config.lineweight_scaling;
        self.stroke_width_cache.clear();
    }

    fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    fn draw_point(&mut self, pos: Point2, properties: &BackendProperties) {
        self.add_strokes(&make_polyline_str(&[pos, pos], false), properties);
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &BackendProperties) {
        self.add_strokes(&make_polyline_str(&[start, end], false), properties);
    }

    fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
        self.add_strokes(&make_multi_line_str(lines), properties);
    }

    fn draw_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        self.add_strokes(&make_path_str(path, false), properties);
    }

    fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
        let d: Vec<String> = paths
            .iter()
            .filter(|path| !path.is_empty())
            .map(|path| make_path_str(path, true))
            .collect();
        self.add_filling(&d.join(" "), properties);
    }

    fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties) {
        self.add_filling(&make_polyline_str(points.vertices(), true), properties);
    }

    fn draw_image(&mut self, image: &ImageData, _properties: &BackendProperties) {
        let href = match png_data_uri(&image.image) {
            Ok(href) => href,
            Err(err) => {
                warn!("skipped image: {err}");
                return;
            }
        };
        let (width, height) = image.image_size();
        // pixel rows run top down, the image transform expects y up
        let [a, b, c, d, e, f] = image.flip_matrix().then(&image.transform).coefficients();
        let _ = write!(
            self.fills,
            "<image width=\"{width}\" height=\"{height}\" transform=\"matrix({a} {b} {c} {d} {e} {f})\" \
             preserveAspectRatio=\"none\" href=\"{href}\" />"
        );
    }

    fn clear(&mut self) {
        self.fills.clear();
        self.strokes.clear();
        self.fill_count = 0;
        self.stroke_count = 0;
    }
}

/// Base64 encoded PNG data URI of `pixels`.
fn png_data_uri(pixels: &PixelBuffer) -> Result<String> {
    let buffer = image::RgbaImage::from_raw(pixels.width(), pixels.height(), pixels.as_rgba().to_vec())
        .ok_or_else(|| CadError::Image("pixel buffer size mismatch".into()))?;
    let mut png = Cursor::new(Vec::new());
    buffer
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|err| CadError::Image(err.to_string()))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png.into_inner())))
}

/// Integer view box coordinates; deltas between rounded vertices don't
/// accumulate rounding errors.
fn quantize(p: Point2) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

fn delta(to: (i64, i64), from: (i64, i64)) -> String {
    format!("{} {}", to.0 - from.0, to.1 - from.1)
}

/// `M x y l dx dy ...`, at least two vertices.
fn make_polyline_str(points: &[Point2], close: bool) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }
    let mut current = quantize(*first);
    let mut d = vec![format!("M {} {}", current.0, current.1), "l".to_string()];
    for point in rest {
        let next = quantize(*point);
        d.push(delta(next, current));
        current = next;
    }
    if close {
        d.push("Z".into());
    }
    d.join(" ")
}

/// Independent line segments as one path, relative moves in between.
fn make_multi_line_str(lines: &[(Point2, Point2)]) -> String {
    let Some((start, end)) = lines.first() else {
        return String::new();
    };
    let (start, end) = (quantize(*start), quantize(*end));
    let mut d = vec![format!("M {} {}", start.0, start.1), format!("l {}", delta(end, start))];
    let mut current = end;
    for (start, end) in &lines[1..] {
        let (start, end) = (quantize(*start), quantize(*end));
        d.push(format!("m {}", delta(start, current)));
        d.push(format!("l {}", delta(end, start)));
        current = end;
    }
    d.join(" ")
}

/// Absolute start, relative `m l q c` commands, `Z` for `close`.
fn make_path_str(path: &Path2d, close: bool) -> String {
    let Some(start) = path.start() else {
        return String::new();
    };
    if path.is_empty() {
        return String::new();
    }
    let mut current = quantize(start);
    let mut d = vec![format!("M {} {}", current.0, current.1)];
    for element in path.commands() {
        let end = quantize(element.end());
        let cmd = match element {
            PathElement::MoveTo(_) => format!("m {}", delta(end, current)),
            PathElement::LineTo(_) => format!("l {}", delta(end, current)),
            PathElement::Curve3To { ctrl, .. } => {
                format!("q {} {}", delta(quantize(ctrl), current), delta(end, current))
            }
            PathElement::Curve4To { ctrl1, ctrl2, .. } => format!(
                "c {} {} {}",
                delta(quantize(ctrl1), current),
                delta(quantize(ctrl2), current),
                delta(end, current)
            ),
        };
        d.push(cmd);
        current = end;
    }
    if close {
        d.push("Z".into());
    }
    d.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadplot_math::Affine2;
    use cadplot_render::{Margins, Units};

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn props(color: Color, lineweight: f64) -> BackendProperties {
        BackendProperties {
            color,
            lineweight,
            ..Default::default()
        }
    }

    fn a4_landscape() -> Page {
        Page::new(297.0, 210.0, Units::Mm)
    }

    #[test]
    fn test_view_box() {
        assert_eq!(make_view_box(&a4_landscape(), 1_000_000.0), (1_000_000, 707_071));
        let portrait = Page::new(210.0, 297.0, Units::Mm);
        assert_eq!(make_view_box(&portrait, 1000.0), (707, 1000));
        let square = Page::new(100.0, 100.0, Units::Mm);
        assert_eq!(make_view_box(&square, 1000.0), (1000, 1000));
    }

    #[test]
    fn test_polyline_str() {
        assert_eq!(make_polyline_str(&[p(0.0, 0.0)], false), "");
        assert_eq!(
            make_polyline_str(&[p(1.0, 2.0), p(4.0, 6.0), p(4.0, 2.0)], true),
            "M 1 2 l 3 4 0 -4 Z"
        );
        // points are zero-length lines
        assert_eq!(make_polyline_str(&[p(5.0, 5.0), p(5.0, 5.0)], false), "M 5 5 l 0 0");
    }

    #[test]
    fn test_rounding_does_not_drift() {
        let points: Vec<Point2> = (0..5).map(|i| p(i as f64 * 1.4, 0.0)).collect();
        // rounded: 0 1 3 4 6
        assert_eq!(make_polyline_str(&points, false), "M 0 0 l 1 0 2 0 1 0 2 0");
    }

    #[test]
    fn test_multi_line_str() {
        assert_eq!(make_multi_line_str(&[]), "");
        let lines = [(p(0.0, 0.0), p(10.0, 0.0)), (p(10.0, 5.0), p(0.0, 5.0))];
        assert_eq!(make_multi_line_str(&lines), "M 0 0 l 10 0 m 0 5 l -10 0");
    }

    #[test]
    fn test_path_str() {
        let mut path = Path2d::new(p(0.0, 0.0));
        path.line_to(p(10.0, 0.0));
        path.curve3_to(p(20.0, 0.0), p(15.0, 5.0));
        path.curve4_to(p(30.0, 0.0), p(22.0, 4.0), p(28.0, 4.0));
        path.move_to(p(0.0, 10.0));
        path.line_to(p(5.0, 10.0));
        assert_eq!(
            make_path_str(&path, false),
            "M 0 0 l 10 0 q 5 5 10 0 c 2 4 8 4 10 0 m -30 10 l 5 0"
        );
        assert_eq!(make_path_str(&Path2d::new(p(1.0, 1.0)), true), "");
    }

    #[test]
    fn test_style_classes_are_deduplicated() {
        let mut styles = Styles::default();
        let red = styles.get_class(Style::stroke(Color::rgb(255, 0, 0), 10));
        let blue = styles.get_class(Style::stroke(Color::rgb(0, 0, 255), 10));
        assert_eq!(red, "C1");
        assert_eq!(blue, "C2");
        assert_eq!(styles.get_class(Style::stroke(Color::rgb(255, 0, 0), 10)), "C1");
        assert_eq!(styles.len(), 2);
        assert_eq!(
            styles.definitions[0],
            ".C1 {stroke: #ff0000; stroke-width: 10; stroke-opacity: 1.000; fill: none; fill-opacity: 1.000;}"
        );
    }

    #[test]
    fn test_class_names_are_hex() {
        let mut styles = Styles::default();
        for i in 0..10u8 {
            styles.get_class(Style::fill(Color::rgb(i, 0, 0)));
        }
        assert_eq!(styles.get_class(Style::fill(Color::rgba(0, 0, 0, 128))), "CB");
        assert!(styles.definitions[10].contains("fill-opacity: 0.502;"));
    }

    #[test]
    fn test_empty_page() {
        let svg = SvgBackend::new();
        let output = svg.get_string(&Page::default(), &Settings::default(), None).unwrap();
        assert_eq!(output, "<svg xmlns=\"http://www.w3.org/2000/svg\" />");
    }

    #[test]
    fn test_document_structure() {
        let mut svg = SvgBackend::new();
        svg.set_background(Color::rgb(0x21, 0x28, 0x30));
        svg.draw_line(p(0.0, 0.0), p(100.0, 50.0), &props(Color::rgb(255, 0, 0), 0.25));
        let square = Points2d::new(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        svg.draw_filled_polygon(&square, &props(Color::BLACK, 0.25));
        let output = svg.get_string(&a4_landscape(), &Settings::default(), None).unwrap();
        assert!(output.starts_with(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"297mm\" height=\"210mm\" \
             viewBox=\"0 0 1000000 707071\">"
        ));
        assert!(output.contains("<rect fill=\"#212830\" fill-opacity=\"1.000\""));
        assert!(output.contains(".C1 {stroke: #ff0000;"));
        assert!(output.contains(".C2 {stroke: none; stroke-width: none;"));
        assert!(output.contains("<g fill-rule=\"evenodd\" stroke=\"none\"><path d=\"M "));
        assert!(output.ends_with("</g></svg>"));
    }

    #[test]
    fn test_y_axis_points_down() {
        let mut svg = SvgBackend::new();
        svg.draw_line(p(0.0, 0.0), p(100.0, 100.0), &props(Color::BLACK, 0.25));
        let page = Page::new(100.0, 100.0, Units::Mm);
        let output = svg.get_string(&page, &Settings::default(), None).unwrap();
        // bottom-left content corner maps to the bottom-left view box corner
        assert!(output.contains("d=\"M 0 1000000 l 1000000 -1000000\""));
    }

    #[test]
    fn test_absolute_stroke_width() {
        let page = Page::new(100.0, 100.0, Units::Mm);
        let mut renderer = SvgRenderer::new(&page, &Settings::default());
        // 1 mm = 10000 view box units
        assert_eq!(renderer.resolve_stroke_width(0.25), 2500);
        assert_eq!(renderer.resolve_stroke_width(0.0), 500);
        renderer.configure(&Configuration::default().with_lineweight_scaling(0.0));
        assert_eq!(renderer.resolve_stroke_width(2.0), 500);
    }

    #[test]
    fn test_relative_stroke_widths() {
        let page = a4_landscape();
        let mut renderer = SvgRenderer::new(&page, &Settings::default());
        renderer.configure(&Configuration::default().with_lineweight_policy(LineweightPolicy::Relative));
        assert_eq!(renderer.resolve_stroke_width(2.11), 1000);
        assert_eq!(renderer.resolve_stroke_width(0.05), 50);
        renderer.configure(&Configuration::default().with_lineweight_policy(LineweightPolicy::RelativeFixed));
        assert_eq!(renderer.resolve_stroke_width(2.11), 150);
    }

    #[test]
    fn test_crop_at_margins() {
        let mut svg = SvgBackend::new();
        svg.draw_line(p(-1000.0, 0.0), p(1000.0, 0.0), &props(Color::BLACK, 0.25));
        let page = Page::new(100.0, 100.0, Units::Mm).with_margins(Margins::all(10.0));
        let settings = Settings {
            fit_page: false,
            crop_at_margins: true,
            output_coordinate_space: 1000.0,
            ..Default::default()
        };
        let output = svg.get_string(&page, &settings, None).unwrap();
        assert!(output.contains("d=\"M 100 500 l 800 0\""));
    }

    #[test]
    fn test_image_is_embedded_as_png() {
        let page = Page::new(100.0, 100.0, Units::Mm);
        let mut renderer = SvgRenderer::new(&page, &Settings::default());
        let image = ImageData::new(PixelBuffer::filled(2, 2, Color::BLACK), Affine2::uniform_scale(10.0));
        renderer.draw_image(&image, &BackendProperties::default());
        assert!(renderer.fills.contains("href=\"data:image/png;base64,iVBORw0KGgo"));
        assert!(renderer.fills.contains("transform=\"matrix(10 0 0 -10 0 20)\""));
    }
}
