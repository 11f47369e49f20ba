//! Pipeline stages: clipping, linetype expansion and backend adaptation.
//!
//! Stages are chained by ownership, each stage owns its successor. The
//! clipping stage comes first so that later stages only see visible
//! geometry, the backend stage is always last.

use std::collections::HashMap;

use cadplot_clip::ClipStack;
use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{area, is_close, Point2, Tolerance};
use log::debug;

use crate::backend::{Backend, ImageData};
use crate::color::{apply_color_policy, Color};
use crate::config::{Configuration, LinePolicy};
use crate::linetype::{DashRenderer, MIN_PATTERN_LENGTH};
use crate::properties::{BackendProperties, Properties};

/// One processing step of the render pipeline.
pub trait RenderStage {
    /// Receive a new configuration.
    fn set_config(&mut self, config: &Configuration);

    /// Process a point.
    fn draw_point(&mut self, pos: Point2, properties: &Properties);

    /// Process a line segment.
    fn draw_line(&mut self, start: Point2, end: Point2, properties: &Properties);

    /// Process solid line segments, already expanded by linetype.
    fn draw_solid_lines(&mut self, lines: Vec<(Point2, Point2)>, properties: &Properties);

    /// Process a path.
    fn draw_path(&mut self, path: Path2d, properties: &Properties);

    /// Process filled paths with holes.
    fn draw_filled_paths(&mut self, paths: Vec<Path2d>, properties: &Properties);

    /// Process a filled polygon.
    fn draw_filled_polygon(&mut self, points: Points2d, properties: &Properties);

    /// Process a raster image.
    fn draw_image(&mut self, image: ImageData, properties: &Properties);
}

fn is_zero_length(start: &Point2, end: &Point2) -> bool {
    is_close(start, end, Tolerance::VERTEX.linear)
}

fn is_degenerate_polygon(points: &Points2d) -> bool {
    points.len() < 3 || area(points.vertices()) <= Tolerance::VERTEX.linear
}

/// Clips all primitives by the active clip shapes.
///
/// First stage of the chain: zero-length lines, polygons without area and
/// empty paths are dropped here, before and after clipping.
#[derive(Debug)]
pub struct ClippingStage<N> {
    next: N,
    stack: ClipStack,
    max_flattening_distance: f64,
}

impl<N: RenderStage> ClippingStage<N> {
    /// Stage in front of `next`.
    pub fn new(next: N) -> Self {
        Self {
            next,
            stack: ClipStack::new(),
            max_flattening_distance: Configuration::default().max_flattening_distance,
        }
    }

    /// The clip stack.
    pub fn stack(&self) -> &ClipStack {
        &self.stack
    }

    /// Mutable access to the clip stack.
    pub fn stack_mut(&mut self) -> &mut ClipStack {
        &mut self.stack
    }

    /// The following stage.
    pub fn next(&self) -> &N {
        &self.next
    }

    /// Mutable access to the following stage.
    pub fn next_mut(&mut self) -> &mut N {
        &mut self.next
    }

    /// Consume the stage and return the following stage.
    pub fn into_next(self) -> N {
        self.next
    }

    fn draw_clipped_image(&mut self, image: ImageData, outer_bounds: &[Points2d], properties: &Properties) {
        let mut image = image;
        if image.use_clipping_boundary {
            image.mask_image(outer_bounds);
        }
        self.next.draw_image(image, properties);
    }
}

/// Result of clipping an image by a clip stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedImage {
    /// The images to draw, each with its own clipping boundary.
    pub images: Vec<ImageData>,
    /// Parts of the image frame which survived the clipping, in pixel
    /// coordinates; only computed for the "remove inside" mode.
    pub outer_bounds: Vec<Points2d>,
}

/// Clip an image by `stack`.
///
/// The clip polygons are mapped into pixel space through the inverse
/// image transform. An image split into several parts is copied for
/// every part; an image clipped away completely yields no images.
pub fn clip_image(mut image: ImageData, stack: &ClipStack) -> ClippedImage {
    let transform = image.flip_matrix().then(&image.transform);
    let clipping_paths = stack.clip_image_polygon(&image.pixel_boundary_path, &transform);
    let mut outer_bounds = Vec::new();
    if !image.remove_outside {
        let (w, h) = image.image_size();
        let frame = Points2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(w as f64, 0.0),
            Point2::new(w as f64, h as f64),
            Point2::new(0.0, h as f64),
        ]);
        outer_bounds = stack
            .clip_image_polygon(&frame, &transform)
            .unwrap_or_else(|| vec![frame]);
    }
    image.transform = stack.transform_matrix(&image.transform);
    let images = match clipping_paths {
        None => vec![image],
        Some(mut parts) if parts.len() == 1 => {
            image.pixel_boundary_path = parts.remove(0);
            image.use_clipping_boundary = true;
            vec![image]
        }
        Some(parts) => parts
            .into_iter()
            .map(|part| ImageData {
                pixel_boundary_path: part,
                use_clipping_boundary: true,
                ..image.clone()
            })
            .collect(),
    };
    ClippedImage { images, outer_bounds }
}

impl<N: RenderStage> RenderStage for ClippingStage<N> {
    fn set_config(&mut self, config: &Configuration) {
        self.max_flattening_distance = config.max_flattening_distance;
        self.next.set_config(config);
    }

    fn draw_point(&mut self, pos: Point2, properties: &Properties) {
        if self.stack.is_active() {
            if let Some(pos) = self.stack.clip_point(pos) {
                self.next.draw_point(pos, properties);
            }
            return;
        }
        self.next.draw_point(pos, properties);
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &Properties) {
        if is_zero_length(&start, &end) {
            debug!("drop zero-length line");
            return;
        }
        if self.stack.is_active() {
            for (s, e) in self.stack.clip_line(start, end) {
                if !is_zero_length(&s, &e) {
                    self.next.draw_line(s, e, properties);
                }
            }
            return;
        }
        self.next.draw_line(start, end, properties);
    }

    fn draw_solid_lines(&mut self, lines: Vec<(Point2, Point2)>, properties: &Properties) {
        let lines = lines.into_iter().filter(|(s, e)| !is_zero_length(s, e));
        let lines: Vec<(Point2, Point2)> = if self.stack.is_active() {
            lines
                .flat_map(|(s, e)| self.stack.clip_line(s, e))
                .filter(|(s, e)| !is_zero_length(s, e))
                .collect()
        } else {
            lines.collect()
        };
        if lines.is_empty() {
            return;
        }
        self.next.draw_solid_lines(lines, properties);
    }

    fn draw_path(&mut self, path: Path2d, properties: &Properties) {
        if path.is_empty() {
            debug!("drop empty path");
            return;
        }
        if self.stack.is_active() {
            for clipped in self.stack.clip_paths(vec![path], self.max_flattening_distance) {
                if !clipped.is_empty() {
                    self.next.draw_path(clipped, properties);
                }
            }
            return;
        }
        self.next.draw_path(path, properties);
    }

    fn draw_filled_paths(&mut self, paths: Vec<Path2d>, properties: &Properties) {
        let paths: Vec<Path2d> = paths.into_iter().filter(|path| !path.is_empty()).collect();
        if paths.is_empty() {
            return;
        }
        let paths = if self.stack.is_active() {
            self.stack.clip_filled_paths(paths, self.max_flattening_distance)
        } else {
            paths
        };
        if paths.is_empty() {
            return;
        }
        self.next.draw_filled_paths(paths, properties);
    }

    fn draw_filled_polygon(&mut self, points: Points2d, properties: &Properties) {
        if is_degenerate_polygon(&points) {
            debug!("drop polygon without area, {} vertices", points.len());
            return;
        }
        if self.stack.is_active() {
            for part in self.stack.clip_polygon(points) {
                if !is_degenerate_polygon(&part) {
                    self.next.draw_filled_polygon(part, properties);
                }
            }
            return;
        }
        self.next.draw_filled_polygon(points, properties);
    }

    fn draw_image(&mut self, image: ImageData, properties: &Properties) {
        if !self.stack.is_active() {
            self.draw_clipped_image(image, &[], properties);
            return;
        }
        let clipped = clip_image(image, &self.stack);
        if clipped.images.is_empty() {
            debug!("image clipped away completely");
        }
        for image in clipped.images {
            self.draw_clipped_image(image, &clipped.outer_bounds, properties);
        }
    }
}

/// Expands styled lines into solid dash segments.
#[derive(Debug)]
pub struct LinetypeStage<N> {
    next: N,
    solid_lines_only: bool,
    min_dash_length: f64,
    max_flattening_distance: f64,
    ltype_scale: f64,
    pattern_cache: HashMap<(String, u64), Vec<f64>>,
}

impl<N: RenderStage> LinetypeStage<N> {
    /// Stage in front of `next`.
    pub fn new(next: N) -> Self {
        let config = Configuration::default();
        Self {
            next,
            solid_lines_only: config.line_policy == LinePolicy::Solid,
            min_dash_length: config.min_dash_length,
            max_flattening_distance: config.max_flattening_distance,
            ltype_scale: 1.0,
            pattern_cache: HashMap::new(),
        }
    }

    /// Additional linetype scale, e.g. to keep dash lengths constant in
    /// scaled viewports.
    pub fn set_ltype_scale(&mut self, scale: f64) {
        self.ltype_scale = scale;
    }

    /// The following stage.
    pub fn next(&self) -> &N {
        &self.next
    }

    /// Mutable access to the following stage.
    pub fn next_mut(&mut self) -> &mut N {
        &mut self.next
    }

    /// Consume the stage and return the following stage.
    pub fn into_next(self) -> N {
        self.next
    }

    /// Number of cached patterns.
    pub fn cached_patterns(&self) -> usize {
        self.pattern_cache.len()
    }

    fn is_solid(&self, properties: &Properties) -> bool {
        self.solid_lines_only || properties.linetype_pattern.len() < 2
    }

    /// The simplified on-off pattern for `properties`, scaled and cached.
    pub fn pattern(&mut self, properties: &Properties) -> &[f64] {
        let scale = if self.solid_lines_only {
            0.0
        } else {
            properties.linetype_scale * self.ltype_scale
        };
        let key = (properties.linetype_name.clone(), scale.to_bits());
        let min_dash_length = self.min_dash_length * self.ltype_scale;
        self.pattern_cache.entry(key).or_insert_with(|| {
            debug!("create pattern {:?} scale {scale}", properties.linetype_name);
            create_pattern(&properties.linetype_pattern, scale, min_dash_length)
        })
    }
}

/// Scale `pattern`, clamp every entry to `min_dash_length` and drop an
/// unpaired last entry. Less than two entries or a pattern without
/// positive length yield an empty pattern.
fn create_pattern(pattern: &[f64], scale: f64, min_dash_length: f64) -> Vec<f64> {
    if pattern.len() < 2 {
        return Vec::new();
    }
    let mut result: Vec<f64> = pattern
        .iter()
        .map(|e| (e * scale).max(min_dash_length).max(0.0))
        .collect();
    if result.len() % 2 == 1 {
        result.pop();
    }
    if result.iter().sum::<f64>() <= MIN_PATTERN_LENGTH {
        return Vec::new();
    }
    result
}

impl<N: RenderStage> RenderStage for LinetypeStage<N> {
    fn set_config(&mut self, config: &Configuration) {
        self.solid_lines_only = config.line_policy == LinePolicy::Solid;
        self.min_dash_length = config.min_dash_length;
        self.max_flattening_distance = config.max_flattening_distance;
        self.pattern_cache.clear();
        self.next.set_config(config);
    }

    fn draw_point(&mut self, pos: Point2, properties: &Properties) {
        self.next.draw_point(pos, properties);
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &Properties) {
        if self.is_solid(properties) {
            self.next.draw_line(start, end, properties);
            return;
        }
        let pattern = self.pattern(properties).to_vec();
        if pattern.is_empty() {
            self.next.draw_line(start, end, properties);
            return;
        }
        let segments = DashRenderer::new(&pattern).line_segment(start, end);
        self.next.draw_solid_lines(segments, properties);
    }

    fn draw_solid_lines(&mut self, lines: Vec<(Point2, Point2)>, properties: &Properties) {
        self.next.draw_solid_lines(lines, properties);
    }

    fn draw_path(&mut self, path: Path2d, properties: &Properties) {
        if self.is_solid(properties) {
            self.next.draw_path(path, properties);
            return;
        }
        let pattern = self.pattern(properties).to_vec();
        if pattern.is_empty() {
            self.next.draw_path(path, properties);
            return;
        }
        let mut renderer = DashRenderer::new(&pattern);
        let mut segments = Vec::new();
        for sub_path in path.sub_paths() {
            segments.extend(renderer.line_segments(sub_path.flattening(self.max_flattening_distance, 16)));
        }
        self.next.draw_solid_lines(segments, properties);
    }

    fn draw_filled_paths(&mut self, paths: Vec<Path2d>, properties: &Properties) {
        self.next.draw_filled_paths(paths, properties);
    }

    fn draw_filled_polygon(&mut self, points: Points2d, properties: &Properties) {
        self.next.draw_filled_polygon(points, properties);
    }

    fn draw_image(&mut self, image: ImageData, properties: &Properties) {
        self.next.draw_image(image, properties);
    }
}

/// Terminal stage: maps [`Properties`] to [`BackendProperties`] and calls
/// the backend. Invisible primitives end here.
#[derive(Debug)]
pub struct BackendStage<B> {
    backend: B,
    config: Configuration,
    color_mapping: HashMap<Color, Color>,
    current_entity_handle: String,
}

impl<B: Backend> BackendStage<B> {
    /// Terminal stage for `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: Configuration::default(),
            color_mapping: HashMap::new(),
            current_entity_handle: String::new(),
        }
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Consume the stage and return the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Handle attached to all following primitives.
    pub fn set_current_entity_handle(&mut self, handle: &str) {
        self.current_entity_handle = handle.to_string();
    }

    /// Map resolved properties to backend properties; mapped colors are
    /// memoized.
    pub fn backend_properties(&mut self, properties: &Properties) -> BackendProperties {
        let config = &self.config;
        let color = *self
            .color_mapping
            .entry(properties.color)
            .or_insert_with(|| apply_color_policy(properties.color, config.color_policy, config.custom_fg_color));
        BackendProperties {
            color,
            lineweight: properties.lineweight,
            layer: properties.layer.clone(),
            pen: properties.pen,
            handle: self.current_entity_handle.clone(),
        }
    }
}

impl<B: Backend> RenderStage for BackendStage<B> {
    fn set_config(&mut self, config: &Configuration) {
        self.config = config.clone();
        self.color_mapping.clear();
    }

    fn draw_point(&mut self, pos: Point2, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_point(pos, &bp);
        }
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_line(start, end, &bp);
        }
    }

    fn draw_solid_lines(&mut self, lines: Vec<(Point2, Point2)>, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_solid_lines(&lines, &bp);
        }
    }

    fn draw_path(&mut self, path: Path2d, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_path(&path, &bp);
        }
    }

    fn draw_filled_paths(&mut self, paths: Vec<Path2d>, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_filled_paths(&paths, &bp);
        }
    }

    fn draw_filled_polygon(&mut self, points: Points2d, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_filled_polygon(&points, &bp);
        }
    }

    fn draw_image(&mut self, image: ImageData, properties: &Properties) {
        if properties.is_visible {
            let bp = self.backend_properties(properties);
            self.backend.draw_image(&image, &bp);
        }
    }
}
