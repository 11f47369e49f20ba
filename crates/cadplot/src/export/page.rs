//! Adapter for external page-description engines.
//!
//! A [`PageEngine`] is the boundary to a PDF or raster library: it receives
//! flattened polylines, polygons and images in points (1/72 inch) with the
//! origin in the top-left page corner. The [`PageEngineBackend`] maps
//! replayed primitives onto such an engine.

use std::collections::HashMap;

use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{is_close, Affine2, BoundingBox2d, Point2, Tolerance};
use cadplot_render::{
    map_lineweight_to_stroke_width, Backend, BackendProperties, Color, Configuration, ImageData, Layout,
    LineweightPolicy, Page, PixelBuffer, Player, Recorder, Settings, MIN_LINEWEIGHT_MM,
};
use log::debug;

use crate::Result;

/// Points per mm.
pub const MM_TO_POINTS: f64 = 72.0 / 25.4;

/// Thinnest stroke in points.
pub const MIN_STROKE_WIDTH_PT: f64 = 0.1;

/// Max. distance between curves and their polylines in points.
pub const FLATTENING_DISTANCE_PT: f64 = 0.1 * MM_TO_POINTS;

/// Stroke attributes, the width in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// Stroke color, alpha is the stroke opacity.
    pub color: Color,
    /// Stroke width in points.
    pub width: f64,
}

/// An external page-description engine, coordinates in points with the
/// origin in the top-left corner.
pub trait PageEngine {
    /// Start a new page.
    fn begin_page(&mut self, width: f64, height: f64);

    /// Stroke polylines with round caps and joins.
    fn stroke_path(&mut self, polylines: &[Vec<Point2>], style: &StrokeStyle);

    /// Fill closed polygons by the even-odd rule; alpha is the fill
    /// opacity.
    fn fill_path(&mut self, polygons: &[Vec<Point2>], color: Color);

    /// Draw an image; `transform` maps pixel coordinates, origin in the
    /// top-left pixel corner, onto the page.
    fn draw_image(&mut self, _image: &PixelBuffer, _transform: &Affine2) {
        debug!("page engine doesn't support images");
    }

    /// Finish the current page.
    fn end_page(&mut self);
}

/// Backend which records a drawing and renders it on a [`PageEngine`].
#[derive(Debug, Default)]
pub struct PageBackend {
    recorder: Recorder,
}

impl PageBackend {
    /// Empty page backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded drawing.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Render the recording on `engine` and return the engine.
    pub fn render<E: PageEngine>(
        &self,
        page: &Page,
        settings: &Settings,
        render_box: Option<BoundingBox2d>,
        engine: E,
    ) -> Result<E> {
        render_page(self.recorder.player(), page, settings, render_box, engine)
    }
}

cadplot_render::delegate_backend!(PageBackend, recorder);

/// Page size in whole points.
pub fn page_size_in_points(page: &Page) -> (f64, f64) {
    (
        (page.width_in_mm() * MM_TO_POINTS).trunc(),
        (page.height_in_mm() * MM_TO_POINTS).trunc(),
    )
}

/// Render `player` on `engine`; the player is placed on the page and
/// consumed. An empty page leaves the engine untouched.
pub fn render_page<E: PageEngine>(
    mut player: Player,
    page: &Page,
    settings: &Settings,
    render_box: Option<BoundingBox2d>,
    engine: E,
) -> Result<E> {
    let render_box = render_box.unwrap_or_else(|| player.bbox());
    let layout = Layout::new(render_box, true);
    let page = layout.final_page(page, settings)?;
    if page.width == 0.0 || page.height == 0.0 {
        debug!("empty page, nothing to render");
        return Ok(engine);
    }
    let (width, height) = page_size_in_points(&page);
    let settings = Settings {
        output_coordinate_space: width.max(height),
        ..settings.clone()
    };
    let m = layout.placement_matrix(&page, &settings, true)?;
    player.transform(&m);
    if settings.crop_at_margins {
        let (p1, p2) = page.margin_rect(true);
        let output_scale = settings.page_output_scale_factor(&page);
        player.crop_rect(p1 * output_scale, p2 * output_scale, FLATTENING_DISTANCE_PT);
    }
    let mut backend = PageEngineBackend::new(engine, &page, &settings);
    player.replay(&mut backend, None)?;
    Ok(backend.into_engine())
}

/// Translates backend calls into [`PageEngine`] calls; input coordinates
/// are points.
#[derive(Debug)]
pub struct PageEngineBackend<E> {
    engine: E,
    width: f64,
    height: f64,
    stroke_width_cache: HashMap<u64, f64>,
    lineweight_policy: LineweightPolicy,
    min_lineweight: f64,
    lineweight_scaling: f64,
    max_stroke_width: f64,
    min_stroke_width: f64,
    fixed_stroke_width: f64,
}

impl<E: PageEngine> PageEngineBackend<E> {
    /// Begins a page of the size of `page` on `engine`.
    pub fn new(mut engine: E, page: &Page, settings: &Settings) -> Self {
        let (width, height) = page_size_in_points(page);
        engine.begin_page(width, height);
        let max_stroke_width = (settings.output_coordinate_space * settings.max_stroke_width)
            .trunc()
            .max(MIN_STROKE_WIDTH_PT);
        Self {
            engine,
            width,
            height,
            stroke_width_cache: HashMap::new(),
            lineweight_policy: LineweightPolicy::Absolute,
            min_lineweight: MIN_LINEWEIGHT_MM,
            lineweight_scaling: 1.0,
            max_stroke_width,
            min_stroke_width: (max_stroke_width * settings.min_stroke_width)
                .trunc()
                .max(MIN_STROKE_WIDTH_PT),
            fixed_stroke_width: (max_stroke_width * settings.fixed_stroke_width)
                .trunc()
                .max(MIN_STROKE_WIDTH_PT),
        }
    }

    /// The engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Consume the backend and return the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }

    fn resolve_stroke_width(&mut self, lineweight: f64) -> f64 {
        let key = lineweight.to_bits();
        if let Some(width) = self.stroke_width_cache.get(&key) {
            return *width;
        }
        let width = match self.lineweight_policy {
            LineweightPolicy::Absolute => {
                self.min_lineweight.max(lineweight) * MM_TO_POINTS * self.lineweight_scaling
            }
            LineweightPolicy::Relative => {
                map_lineweight_to_stroke_width(lineweight, self.min_stroke_width, self.max_stroke_width)
            }
            LineweightPolicy::RelativeFixed => self.fixed_stroke_width,
        }
        .max(MIN_STROKE_WIDTH_PT);
        self.stroke_width_cache.insert(key, width);
        width
    }

    fn stroke(&mut self, polylines: &[Vec<Point2>], properties: &BackendProperties) {
        if polylines.is_empty() {
            return;
        }
        let style = StrokeStyle {
            color: properties.color,
            width: self.resolve_stroke_width(properties.lineweight),
        };
        self.engine.stroke_path(polylines, &style);
    }

    fn fill(&mut self, polygons: &[Vec<Point2>], properties: &BackendProperties) {
        if !polygons.is_empty() {
            self.engine.fill_path(polygons, properties.color);
        }
    }
}

fn flatten(path: &Path2d) -> Vec<Point2> {
    path.flattening(FLATTENING_DISTANCE_PT, 4).collect()
}

/// Closed polygon with at least 3 vertices.
fn closed_polygon(mut vertices: Vec<Point2>) -> Option<Vec<Point2>> {
    let (first, last) = (*vertices.first()?, *vertices.last()?);
    if !is_close(&first, &last, Tolerance::VERTEX.linear) {
        vertices.push(first);
    }
    (vertices.len() > 3).then_some(vertices)
}

impl<E: PageEngine> Backend for PageEngineBackend<E> {
    fn configure(&mut self, config: &Configuration) {
        self.lineweight_policy = config.lineweight_policy;
        if let Some(min_lineweight) = config.min_lineweight_mm() {
            self.min_lineweight = min_lineweight;
        }
        self.lineweight_scaling = config.lineweight_scaling;
        self.stroke_width_cache.clear();
    }

    /// White or transparent backgrounds are the page itself.
    fn set_background(&mut self, color: Color) {
        if color.to_rgb() == Color::WHITE.to_rgb() || color.a == 0 {
            return;
        }
        let page_rect = vec![
            Point2::new(0.0, 0.0),
            Point2::new(self.width, 0.0),
            Point2::new(self.width, self.height),
            Point2::new(0.0, self.height),
            Point2::new(0.0, 0.0),
        ];
        self.engine.fill_path(&[page_rect], color);
    }

    fn draw_point(&mut self, pos: Point2, properties: &BackendProperties) {
        self.stroke(&[vec![pos, pos]], properties);
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &BackendProperties) {
        self.stroke(&[vec![start, end]], properties);
    }

    fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
        let polylines: Vec<Vec<Point2>> = lines.iter().map(|(s, e)| vec![*s, *e]).collect();
        self.stroke(&polylines, properties);
    }

    fn draw_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        let polylines: Vec<Vec<Point2>> = path
            .sub_paths()
            .iter()
            .map(flatten)
            .filter(|vertices| vertices.len() > 1)
            .collect();
        self.stroke(&polylines, properties);
    }

    fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
        let polygons: Vec<Vec<Point2>> = paths
            .iter()
            .flat_map(|path| path.sub_paths())
            .filter_map(|sub_path| closed_polygon(flatten(&sub_path)))
            .collect();
        self.fill(&polygons, properties);
    }

    fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties) {
        if let Some(polygon) = closed_polygon(points.vertices().to_vec()) {
            self.fill(&[polygon], properties);
        } else {
            debug!("degenerate filled polygon dropped");
        }
    }

    fn draw_image(&mut self, image: &ImageData, _properties: &BackendProperties) {
        let transform = image.flip_matrix().then(&image.transform);
        self.engine.draw_image(&image.image, &transform);
    }

    fn clear(&mut self) {}

    fn finalize(&mut self) {
        self.engine.end_page();
    }

    fn max_flattening_distance(&self) -> f64 {
        FLATTENING_DISTANCE_PT
    }
}
