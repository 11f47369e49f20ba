//! HPGL/2 plot file backend.
//!
//! The [`PlotterBackend`] records the drawing. Exporting places the
//! recording on the page in plot units (40 plu = 1 mm, origin in the
//! bottom-left corner), optionally crops it at the page margins and replays
//! it into a renderer which writes the plot commands.

use std::collections::HashMap;

use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{BoundingBox2d, Point2};
use cadplot_render::{
    map_lineweight_to_stroke_width, round_to, Backend, BackendProperties, Color, Configuration, ImageData, Layout,
    LineweightPolicy, Page, Player, Recorder, Result, Settings,
};
use log::{debug, warn};

use crate::codec::{format_number, path_encoder, polyline_encoder};
use crate::pens::{pen_color_command, PenTable, Rgb, DEFAULT_PEN};
use crate::quality::{PlotterOptions, PlotterQuality};

/// Reset and format commands at the start of every plot file.
pub const PRELUDE: &[u8] = b"%0B;IN;BP;";

/// Commands at the end of every plot file.
pub const EPILOG: &[u8] = b"PU;PA0,0;";

/// Plot units per mm.
pub const MM_TO_PLU: f64 = 40.0;

/// Maximum flattening distance of curves in plot units.
pub const MAX_FLATTEN: f64 = 10.0;

const BLACK: Rgb = (0, 0, 0);
const WHITE: Rgb = (255, 255, 255);

/// Backend which records a drawing and exports it as HPGL/2 plot file.
#[derive(Debug, Default)]
pub struct PlotterBackend {
    recorder: Recorder,
}

impl PlotterBackend {
    /// Empty plotter backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded drawing.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Plot file of the recording; `render_box` selects the region to
    /// render, the content extents by default. An empty page gives no
    /// data.
    pub fn get_bytes(
        &self,
        page: &Page,
        settings: &Settings,
        render_box: Option<BoundingBox2d>,
        options: &PlotterOptions,
    ) -> Result<Vec<u8>> {
        plot(self.recorder.player(), page, settings, render_box, options)
    }

    /// 7-bit plot file, curves flattened, integer coordinates. Smallest
    /// files for every device, coarse text.
    pub fn compatible(&self, page: &Page, settings: &Settings) -> Result<Vec<u8>> {
        self.get_bytes(page, settings, None, &PlotterQuality::Compatible.options())
    }

    /// 8-bit plot file with Bezier curves and integer coordinates.
    pub fn low_quality(&self, page: &Page, settings: &Settings) -> Result<Vec<u8>> {
        self.get_bytes(page, settings, None, &PlotterQuality::Low.options())
    }

    /// 8-bit plot file with Bezier curves and one decimal place.
    pub fn normal_quality(&self, page: &Page, settings: &Settings) -> Result<Vec<u8>> {
        self.get_bytes(page, settings, None, &PlotterQuality::Normal.options())
    }

    /// 8-bit plot file with Bezier curves and two decimal places.
    pub fn high_quality(&self, page: &Page, settings: &Settings) -> Result<Vec<u8>> {
        self.get_bytes(page, settings, None, &PlotterQuality::High.options())
    }
}

cadplot_render::delegate_backend!(PlotterBackend, recorder);

/// Plot file of `player`; the player is placed on the page and consumed.
pub fn plot(
    mut player: Player,
    page: &Page,
    settings: &Settings,
    render_box: Option<BoundingBox2d>,
    options: &PlotterOptions,
) -> Result<Vec<u8>> {
    let render_box = render_box.unwrap_or_else(|| player.bbox());
    let layout = Layout::new(render_box, false);
    let page = layout.final_page(page, settings)?;
    if page.width == 0.0 || page.height == 0.0 {
        return Ok(Vec::new());
    }
    let settings = Settings {
        output_coordinate_space: page.width_in_mm().max(page.height_in_mm()) * MM_TO_PLU,
        ..settings.clone()
    };
    let m = layout.placement_matrix(&page, &settings, false)?;
    player.transform(&m);
    if settings.crop_at_margins {
        let (p1, p2) = page.margin_rect(false);
        let output_scale = settings.page_output_scale_factor(&page);
        // curve approximation 0.1 mm
        player.crop_rect(p1 * output_scale, p2 * output_scale, 0.1 * MM_TO_PLU);
    }
    let mut renderer = PlotRenderer::new(&page, &settings, options);
    player.replay(&mut renderer, None)?;
    debug!(
        "plot file: {} pens, {} bytes of drawing commands",
        renderer.pen_table.len(),
        renderer.data.len()
    );
    Ok(renderer.into_bytes())
}

/// Writes HPGL/2 commands for replayed primitives in plot units.
#[derive(Debug)]
struct PlotRenderer {
    options: PlotterOptions,
    fractional_bits: u32,
    header: Vec<u8>,
    data: Vec<u8>,
    pen_table: PenTable,
    current_pen: i32,
    current_pen_width: f64,
    stroke_width_cache: HashMap<u64, f64>,
    lineweight_policy: LineweightPolicy,
    min_lineweight: f64,
    lineweight_scaling: f64,
    max_stroke_width: f64,
    min_stroke_width: f64,
    fixed_stroke_width: f64,
}

impl PlotRenderer {
    fn new(page: &Page, settings: &Settings, options: &PlotterOptions) -> Self {
        let (width, height) = (page.width_in_mm(), page.height_in_mm());
        let header = format!("PS{:.0},{:.0};FT1;PA;", width * MM_TO_PLU, height * MM_TO_PLU);
        let max_stroke_width = round_to(width.max(height) * settings.max_stroke_width, 2);
        Self {
            options: *options,
            fractional_bits: options.fractional_bits(),
            header: header.into_bytes(),
            data: Vec::new(),
            pen_table: PenTable::default(),
            current_pen: DEFAULT_PEN,
            current_pen_width: 0.0,
            stroke_width_cache: HashMap::new(),
            lineweight_policy: LineweightPolicy::Absolute,
            min_lineweight: 0.05,
            lineweight_scaling: 1.0,
            max_stroke_width,
            min_stroke_width: round_to(max_stroke_width * settings.min_stroke_width, 2),
            fixed_stroke_width: round_to(max_stroke_width * settings.fixed_stroke_width, 2),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut output = PRELUDE.to_vec();
        output.extend_from_slice(&self.header);
        output.extend(self.pen_table.to_bytes());
        output.extend_from_slice(&self.data);
        output.extend_from_slice(EPILOG);
        output
    }

    /// Pen for `rgb`; a pen defined with another color is replaced by the
    /// recolored default pen.
    fn switch_current_pen(&mut self, pen: i32, rgb: Rgb) -> i32 {
        let pen = if self.pen_table.is_valid_pen(pen) {
            pen
        } else {
            warn!("pen {pen} is out of range, using pen {DEFAULT_PEN}");
            DEFAULT_PEN
        };
        match self.pen_table.get(pen) {
            Some(color) if color != rgb => {
                self.data.extend(pen_color_command(DEFAULT_PEN, rgb).into_bytes());
                DEFAULT_PEN
            }
            Some(_) => pen,
            None => {
                self.pen_table.add_pen(pen, rgb);
                pen
            }
        }
    }

    fn set_pen(&mut self, pen: i32) {
        if self.current_pen != pen {
            self.data.extend(format!("SP{pen};").into_bytes());
            self.current_pen = pen;
        }
    }

    fn set_pen_width(&mut self, width: f64) {
        if self.current_pen_width != width {
            // pen width in mm
            self.data.extend(format!("PW{};", format_number(width, 2)).into_bytes());
            self.current_pen_width = width;
        }
    }

    fn set_properties(&mut self, properties: &BackendProperties) {
        let rgb = resolve_pen_color(properties.color);
        let width = self.resolve_pen_width(properties.lineweight);
        let pen = self.switch_current_pen(properties.pen, rgb);
        self.set_pen(pen);
        self.set_pen_width(width);
    }

    fn resolve_pen_width(&mut self, lineweight: f64) -> f64 {
        let key = lineweight.to_bits();
        if let Some(width) = self.stroke_width_cache.get(&key) {
            return *width;
        }
        let width = match self.lineweight_policy {
            LineweightPolicy::Absolute if self.lineweight_scaling != 0.0 => {
                round_to(self.min_lineweight.max(lineweight) * self.lineweight_scaling, 2)
            }
            LineweightPolicy::Absolute => round_to(self.min_lineweight, 2),
            LineweightPolicy::Relative => {
                map_lineweight_to_stroke_width(lineweight, self.min_stroke_width, self.max_stroke_width)
            }
            LineweightPolicy::RelativeFixed => self.fixed_stroke_width,
        };
        self.stroke_width_cache.insert(key, width);
        width
    }

    fn enter_polygon_mode(&mut self, start: Point2) {
        let dp = self.options.decimal_places;
        let cmd = format!(
            "PA;PU{},{};PM;",
            format_number(start.x, dp),
            format_number(start.y, dp)
        );
        self.data.extend(cmd.into_bytes());
    }

    fn close_current_polygon(&mut self) {
        self.data.extend_from_slice(b"PM1;");
    }

    fn fill_polygon(&mut self) {
        // even/odd fill
        self.data.extend_from_slice(b"PM2;FP;");
    }

    fn add_polyline_encoded(&mut self, vertices: &[Point2], properties: &BackendProperties) {
        self.set_properties(properties);
        self.data
            .extend(polyline_encoder(vertices, self.fractional_bits, self.options.base));
    }

    fn add_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        if self.options.curves && path.has_curves() {
            self.set_properties(properties);
            self.data.extend(path_encoder(path, self.options.decimal_places));
        } else {
            let vertices: Vec<Point2> = path.flattening(MAX_FLATTEN, 4).collect();
            self.add_polyline_encoded(&vertices, properties);
        }
    }
}

/// White pens plot black on white paper.
fn resolve_pen_color(color: Color) -> Rgb {
    match color.to_rgb() {
        WHITE => BLACK,
        rgb => rgb,
    }
}

impl Backend for PlotRenderer {
    fn configure(&mut self, config: &Configuration) {
        self.lineweight_policy = config.lineweight_policy;
        if let Some(min_lineweight) = config.min_lineweight_mm() {
            self.min_lineweight = min_lineweight;
        }
        self.lineweight_scaling = config.lineweight_scaling;
        self.stroke_width_cache.clear();
    }

    // plots are always on white paper
    fn set_background(&mut self, _color: Color) {}

    fn draw_point(&mut self, pos: Point2, properties: &BackendProperties) {
        self.add_polyline_encoded(&[pos], properties);
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &BackendProperties) {
        self.add_polyline_encoded(&[start, end], properties);
    }

    fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
        for (start, end) in lines {
            self.add_polyline_encoded(&[*start, *end], properties);
        }
    }

    fn draw_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        for sub_path in path.sub_paths() {
            if !sub_path.is_empty() {
                self.add_path(&sub_path, properties);
            }
        }
    }

    fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
        let Some(start) = paths.iter().find_map(|p| p.start()) else {
            return;
        };
        self.enter_polygon_mode(start);
        for path in paths {
            for sub_path in path.sub_paths() {
                if !sub_path.is_empty() {
                    self.add_path(&sub_path, properties);
                    self.close_current_polygon();
                }
            }
        }
        self.fill_polygon();
    }

    fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties) {
        let Some(start) = points.vertices().first().copied() else {
            return;
        };
        self.enter_polygon_mode(start);
        self.add_polyline_encoded(points.vertices(), properties);
        self.fill_polygon();
    }

    fn draw_image(&mut self, _image: &ImageData, _properties: &BackendProperties) {
        debug!("raster images are not plotted");
    }

    fn clear(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PeDecoder;
    use cadplot_render::{Margins, Units};

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn props(color: Color, pen: i32, lineweight: f64) -> BackendProperties {
        BackendProperties {
            color,
            pen,
            lineweight,
            ..Default::default()
        }
    }

    fn a4_landscape() -> Page {
        Page::new(297.0, 210.0, Units::Mm)
    }

    fn text(data: &[u8]) -> String {
        String::from_utf8_lossy(data).into_owned()
    }

    fn contains(data: &[u8], needle: &[u8]) -> bool {
        data.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_empty_page_gives_no_data() {
        let plotter = PlotterBackend::new();
        let page = Page::new(0.0, 0.0, Units::Mm);
        assert!(plotter.normal_quality(&page, &Settings::default()).unwrap().is_empty());
    }

    #[test]
    fn test_file_structure() {
        let mut plotter = PlotterBackend::new();
        plotter.draw_line(p(0.0, 0.0), p(100.0, 0.0), &props(Color::rgb(255, 0, 0), 1, 0.25));
        let data = plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap();
        assert!(data.starts_with(b"%0B;IN;BP;PS11880,8400;FT1;PA;NP255;PC1,255,0,0;SP1;PW0.25;PE>"));
        assert!(data.ends_with(EPILOG));
    }

    #[test]
    fn test_line_is_centered_in_plot_units() {
        let mut plotter = PlotterBackend::new();
        plotter.draw_line(p(0.0, 0.0), p(100.0, 0.0), &props(Color::BLACK, 1, 0.25));
        let data = plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap();
        let polylines = PeDecoder::decode(&data).unwrap();
        assert_eq!(polylines, vec![vec![p(3940.0, 4200.0), p(7940.0, 4200.0)]]);
    }

    #[test]
    fn test_white_pen_plots_black() {
        let mut plotter = PlotterBackend::new();
        plotter.draw_line(p(0.0, 0.0), p(10.0, 10.0), &props(Color::WHITE, 2, 0.25));
        let data = plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap();
        assert!(contains(&data, b"PC2,0,0,0;"));
    }

    #[test]
    fn test_pen_color_conflict_uses_default_pen() {
        let mut plotter = PlotterBackend::new();
        plotter.draw_line(p(0.0, 0.0), p(10.0, 10.0), &props(Color::rgb(255, 0, 0), 1, 0.25));
        plotter.draw_line(p(0.0, 10.0), p(10.0, 0.0), &props(Color::rgb(0, 0, 255), 1, 0.25));
        let data = plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap();
        let output = text(&data);
        assert!(output.contains("NP255;PC1,255,0,0;SP1;"));
        assert!(output.contains("PC0,0,0,255;SP0;"));
    }

    #[test]
    fn test_pen_width_changes_only() {
        let mut plotter = PlotterBackend::new();
        let bp = props(Color::BLACK, 1, 0.5);
        plotter.draw_line(p(0.0, 0.0), p(10.0, 10.0), &bp);
        plotter.draw_line(p(0.0, 10.0), p(10.0, 0.0), &bp);
        plotter.draw_line(p(5.0, 0.0), p(5.0, 10.0), &props(Color::BLACK, 1, 0.25));
        let data = plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap();
        let output = text(&data);
        assert_eq!(output.matches("PW0.5;").count(), 1);
        assert_eq!(output.matches("PW0.25;").count(), 1);
        assert_eq!(output.matches("SP1;").count(), 1);
    }

    #[test]
    fn test_relative_lineweight_policy() {
        let mut plotter = PlotterBackend::new();
        plotter.configure(&Configuration::default().with_lineweight_policy(LineweightPolicy::Relative));
        plotter.draw_line(p(0.0, 0.0), p(10.0, 10.0), &props(Color::BLACK, 1, 2.11));
        let data = plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap();
        // max stroke width: 297 mm * 0.001
        assert!(contains(&data, b"PW0.3;"));
    }

    #[test]
    fn test_filled_polygon_mode() {
        let mut plotter = PlotterBackend::new();
        let square = Points2d::new(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        plotter.draw_filled_polygon(&square, &props(Color::BLACK, 1, 0.25));
        let output = text(&plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap());
        assert!(output.contains("PA;PU"));
        assert!(output.contains(";PM;"));
        assert!(output.contains("PM2;FP;"));
    }

    #[test]
    fn test_filled_paths_close_every_sub_path() {
        let mut plotter = PlotterBackend::new();
        let outer = Path2d::from_vertices([p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)], true);
        let hole = Path2d::from_vertices([p(2.0, 2.0), p(8.0, 2.0), p(8.0, 8.0), p(2.0, 8.0)], true);
        plotter.draw_filled_paths(&[outer, hole], &props(Color::BLACK, 1, 0.25));
        let output = text(&plotter.normal_quality(&a4_landscape(), &Settings::default()).unwrap());
        assert_eq!(output.matches("PM1;").count(), 2);
        assert_eq!(output.matches("PM2;FP;").count(), 1);
    }

    #[test]
    fn test_curves_by_quality() {
        let mut plotter = PlotterBackend::new();
        let mut path = Path2d::new(p(0.0, 0.0));
        path.curve4_to(p(100.0, 0.0), p(30.0, 50.0), p(70.0, 50.0));
        plotter.draw_path(&path, &props(Color::BLACK, 1, 0.25));
        let page = a4_landscape();
        let settings = Settings::default();

        let normal = text(&plotter.normal_quality(&page, &settings).unwrap());
        assert!(normal.contains("BR"));
        assert!(!normal.contains("PE"));

        let compatible = plotter.compatible(&page, &settings).unwrap();
        assert!(!text(&compatible).contains("BR"));
        assert!(contains(&compatible, b"PE7<="));
        let polylines = PeDecoder::decode(&compatible).unwrap();
        assert_eq!(polylines.len(), 1);
        assert!(polylines[0].len() > 4);
    }

    #[test]
    fn test_crop_at_margins() {
        let mut plotter = PlotterBackend::new();
        plotter.draw_line(p(-1000.0, 0.0), p(1000.0, 0.0), &props(Color::BLACK, 1, 0.25));
        let page = Page::new(100.0, 100.0, Units::Mm).with_margins(Margins::all(10.0));
        let settings = Settings {
            fit_page: false,
            crop_at_margins: true,
            ..Default::default()
        };
        let data = plotter.normal_quality(&page, &settings).unwrap();
        let polylines = PeDecoder::decode(&data).unwrap();
        assert_eq!(polylines, vec![vec![p(400.0, 2000.0), p(3600.0, 2000.0)]]);
    }

    #[test_log::test]
    fn test_pen_out_of_range() {
        let page = a4_landscape();
        let settings = Settings::default();
        let mut renderer = PlotRenderer::new(&page, &settings, &PlotterOptions::default());
        renderer.draw_line(p(0.0, 0.0), p(1.0, 1.0), &props(Color::rgb(1, 2, 3), 300, 0.25));
        assert_eq!(renderer.current_pen, DEFAULT_PEN);
        assert_eq!(renderer.pen_table.get(DEFAULT_PEN), Some((1, 2, 3)));
    }

    #[test]
    fn test_images_are_skipped() {
        let page = a4_landscape();
        let mut renderer = PlotRenderer::new(&page, &Settings::default(), &PlotterOptions::default());
        let image = ImageData::new(
            cadplot_render::PixelBuffer::filled(2, 2, Color::BLACK),
            cadplot_math::Affine2::identity(),
        );
        renderer.draw_image(&image, &BackendProperties::default());
        assert!(renderer.data.is_empty());
    }
}
