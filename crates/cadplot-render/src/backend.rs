//! The uniform output contract and raster image data.

use std::sync::Arc;

use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{Affine2, Point2};

use crate::color::Color;
use crate::config::Configuration;
use crate::properties::BackendProperties;

/// Output adapter for resolved drawing primitives.
///
/// Coordinates are drawing units after clipping and linetype expansion.
/// Backends are not thread safe; every concurrent replay owns its backend.
pub trait Backend {
    /// Receive the configuration before any drawing call.
    fn configure(&mut self, _config: &Configuration) {}

    /// Start the primitives of the entity `handle`.
    fn enter_entity(&mut self, _handle: &str) {}

    /// End the primitives of the entity `handle`.
    fn exit_entity(&mut self, _handle: &str) {}

    /// Set the background color.
    fn set_background(&mut self, color: Color);

    /// Draw a point.
    fn draw_point(&mut self, pos: Point2, properties: &BackendProperties);

    /// Draw a line segment.
    fn draw_line(&mut self, start: Point2, end: Point2, properties: &BackendProperties);

    /// Draw independent solid line segments.
    fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
        for (start, end) in lines {
            if start == end {
                self.draw_point(*start, properties);
            } else {
                self.draw_line(*start, *end, properties);
            }
        }
    }

    /// Draw an open or closed path, curves included.
    fn draw_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        let distance = self.max_flattening_distance();
        for sub_path in path.sub_paths() {
            let mut vertices = sub_path.flattening(distance, 16);
            let Some(mut prev) = vertices.next() else {
                continue;
            };
            for vertex in vertices {
                self.draw_line(prev, vertex, properties);
                prev = vertex;
            }
        }
    }

    /// Draw filled paths; the default fills every sub-path as polygon and
    /// loses holes.
    fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
        let distance = self.max_flattening_distance();
        for sub_path in paths.iter().flat_map(|p| p.sub_paths()) {
            if let Ok(points) = sub_path.to_points2d(distance, 16) {
                self.draw_filled_polygon(&points, properties);
            }
        }
    }

    /// Draw a filled polygon, the polygon is implicitly closed.
    fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties);

    /// Draw a raster image.
    fn draw_image(&mut self, image: &ImageData, properties: &BackendProperties);

    /// Discard all output.
    fn clear(&mut self);

    /// Finish the output after the last drawing call.
    fn finalize(&mut self) {}

    /// Flattening distance of the default path implementations, backends
    /// return the configured value.
    fn max_flattening_distance(&self) -> f64 {
        Configuration::default().max_flattening_distance
    }
}

/// An RGBA8 pixel buffer, row 0 is the top row.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap RGBA bytes; `None` if the buffer size doesn't match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 4).then_some(Self { width, height, data })
    }

    /// Buffer filled with one color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let pixel = [color.r, color.g, color.b, color.a];
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, data }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGBA bytes, row by row.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value of pixel (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Clear the alpha channel of every pixel where `mask` is `false`.
    fn apply_mask(&mut self, mask: &[bool]) {
        for (pixel, visible) in self.data.chunks_exact_mut(4).zip(mask) {
            if !visible {
                pixel[3] = 0;
            }
        }
    }
}

/// A raster image placed in drawing space.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Pixels, shared between copies until masked.
    pub image: Arc<PixelBuffer>,
    /// Maps pixel coordinates (x right, y up from the bottom-left corner)
    /// into drawing coordinates.
    pub transform: Affine2,
    /// Clipping boundary in pixel coordinates, origin top-left.
    pub pixel_boundary_path: Points2d,
    /// Clip the image by the pixel boundary.
    pub use_clipping_boundary: bool,
    /// `true` removes the pixels outside the boundary, `false` the pixels
    /// inside.
    pub remove_outside: bool,
}

impl ImageData {
    /// Image without clipping boundary; the boundary is the image frame.
    pub fn new(image: PixelBuffer, transform: Affine2) -> Self {
        let (w, h) = (image.width() as f64, image.height() as f64);
        Self {
            image: Arc::new(image),
            transform,
            pixel_boundary_path: Points2d::new(vec![
                Point2::new(0.0, 0.0),
                Point2::new(w, 0.0),
                Point2::new(w, h),
                Point2::new(0.0, h),
            ]),
            use_clipping_boundary: false,
            remove_outside: true,
        }
    }

    /// Width and height in pixels.
    pub fn image_size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Flip pixel rows: `(x, y) -> (x, height - y)`.
    pub fn flip_matrix(&self) -> Affine2 {
        Affine2::scale(1.0, -1.0).then(&Affine2::translation(0.0, self.image.height() as f64))
    }

    /// Clear the alpha channel of every pixel removed by the clipping
    /// boundary.
    ///
    /// `outer_bounds` are the parts of the image which survived the
    /// clipping by viewports and block references; only used for the
    /// "remove inside" mode, empty means the whole image.
    pub fn mask_image(&mut self, outer_bounds: &[Points2d]) {
        let (width, height) = self.image_size();
        let mut mask = vec![false; width as usize * height as usize];
        fill_polygon(&mut mask, width, height, self.pixel_boundary_path.vertices());
        if !self.remove_outside {
            let mut visible = vec![outer_bounds.is_empty(); mask.len()];
            for boundary in outer_bounds {
                fill_polygon(&mut visible, width, height, boundary.vertices());
            }
            for (m, v) in mask.iter_mut().zip(visible) {
                *m = v && !*m;
            }
        }
        Arc::make_mut(&mut self.image).apply_mask(&mask);
    }
}

/// Set the mask of every pixel whose center is inside `polygon`, even-odd
/// rule.
fn fill_polygon(mask: &mut [bool], width: u32, height: u32, polygon: &[Point2]) {
    if polygon.len() < 3 {
        return;
    }
    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..height {
        let y = row as f64 + 0.5;
        crossings.clear();
        let mut prev = polygon[polygon.len() - 1];
        for &p in polygon {
            if (prev.y <= y) != (p.y <= y) {
                crossings.push(prev.x + (y - prev.y) * (p.x - prev.x) / (p.y - prev.y));
            }
            prev = p;
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        let offset = row as usize * width as usize;
        for span in crossings.chunks_exact(2) {
            // pixels with center x + 0.5 in [span[0], span[1])
            let first = (span[0] - 0.5).ceil().max(0.0) as usize;
            let last = ((span[1] - 0.5).ceil().min(width as f64)).max(0.0) as usize;
            for cell in mask[offset + first.min(width as usize)..offset + last].iter_mut() {
                *cell = true;
            }
        }
    }
}
