//! Capture of resolved drawing primitives.
//!
//! The [`Recorder`] is a backend which stores compact records instead of
//! writing output. Properties are stored once per distinct style in a
//! property table; records refer to them by hash.

use std::collections::HashMap;
use std::sync::Arc;

use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{Affine2, BoundingBox2d, Point2};
use log::warn;

use crate::backend::{Backend, ImageData};
use crate::color::Color;
use crate::config::Configuration;
use crate::player::Player;
use crate::properties::BackendProperties;

/// Geometry of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    /// 1 vertex is a point, 2 vertices are a line, more vertices are a
    /// filled polygon.
    Points(Points2d),
    /// Flat endpoint buffer of independent line segments, start and end
    /// alternate.
    SolidLines(Vec<Point2>),
    /// An open or closed path.
    Path(Path2d),
    /// Filled paths, holes included.
    FilledPaths(Vec<Path2d>),
    /// A raster image and its boundary in drawing coordinates.
    Image {
        /// Image data, the transform maps pixels into drawing coordinates.
        image: ImageData,
        /// Clipping boundary of the image in drawing coordinates.
        boundary: Points2d,
    },
}

/// A captured primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Key into the property table.
    pub property_hash: u64,
    /// Handle of the source entity.
    pub handle: String,
    /// The geometry.
    pub data: RecordData,
}

impl Record {
    /// Record for `properties` with the geometry `data`.
    pub fn new(properties: &BackendProperties, data: RecordData) -> Self {
        Self {
            property_hash: properties.property_hash(),
            handle: properties.handle.clone(),
            data,
        }
    }

    /// Record with the same properties and handle but other geometry.
    pub fn with_data(&self, data: RecordData) -> Self {
        Self {
            property_hash: self.property_hash,
            handle: self.handle.clone(),
            data,
        }
    }

    /// Bounding box of the geometry; control vertices of curves included.
    pub fn bbox(&self) -> BoundingBox2d {
        match &self.data {
            RecordData::Points(points) => points.bbox(),
            RecordData::SolidLines(lines) => BoundingBox2d::from_points(lines.iter()),
            RecordData::Path(path) => path.bbox(),
            RecordData::FilledPaths(paths) => paths.iter().fold(BoundingBox2d::empty(), |mut bbox, path| {
                bbox.extend(&path.bbox());
                bbox
            }),
            RecordData::Image { boundary, .. } => boundary.bbox(),
        }
    }

    /// Transform the geometry in place.
    pub fn transform_inplace(&mut self, m: &Affine2) {
        match &mut self.data {
            RecordData::Points(points) => points.transform_inplace(m),
            RecordData::SolidLines(lines) => m.apply_inplace(lines),
            RecordData::Path(path) => path.transform_inplace(m),
            RecordData::FilledPaths(paths) => {
                for path in paths.iter_mut() {
                    path.transform_inplace(m);
                }
            }
            RecordData::Image { image, boundary } => {
                boundary.transform_inplace(m);
                image.transform = image.transform.then(m);
            }
        }
    }
}

/// Backend which captures primitives for a later replay.
#[derive(Debug, Default)]
pub struct Recorder {
    config: Configuration,
    background: Color,
    records: Vec<Record>,
    properties: HashMap<u64, BackendProperties>,
}

impl Recorder {
    /// Empty recorder with black background.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured records.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of distinct styles in the property table.
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The recorded background color.
    pub fn background(&self) -> Color {
        self.background
    }

    /// A player for the captured records; the recorder stays usable.
    pub fn player(&self) -> Player {
        Player::new(
            Arc::new(self.records.clone()),
            Arc::new(self.properties.clone()),
            self.background,
            self.config.clone(),
        )
    }

    /// Consume the recorder and return a player for its records.
    pub fn into_player(self) -> Player {
        Player::new(
            Arc::new(self.records),
            Arc::new(self.properties),
            self.background,
            self.config,
        )
    }

    fn store(&mut self, data: RecordData, properties: &BackendProperties) {
        let record = Record::new(properties, data);
        self.properties
            .entry(record.property_hash)
            .or_insert_with(|| BackendProperties {
                handle: String::new(),
                ..properties.clone()
            });
        self.records.push(record);
    }
}

impl Backend for Recorder {
    fn configure(&mut self, config: &Configuration) {
        self.config = config.clone();
    }

    fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    fn draw_point(&mut self, pos: Point2, properties: &BackendProperties) {
        self.store(RecordData::Points(Points2d::new(vec![pos])), properties);
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &BackendProperties) {
        self.store(RecordData::Points(Points2d::new(vec![start, end])), properties);
    }

    fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
        if lines.is_empty() {
            return;
        }
        let buffer = lines.iter().flat_map(|(s, e)| [*s, *e]).collect();
        self.store(RecordData::SolidLines(buffer), properties);
    }

    fn draw_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        if path.is_empty() {
            return;
        }
        self.store(RecordData::Path(path.clone()), properties);
    }

    fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
        let paths: Vec<Path2d> = paths.iter().filter(|p| !p.is_empty()).cloned().collect();
        if paths.is_empty() {
            return;
        }
        self.store(RecordData::FilledPaths(paths), properties);
    }

    fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties) {
        if points.is_empty() {
            return;
        }
        self.store(RecordData::Points(points.clone()), properties);
    }

    fn draw_image(&mut self, image: &ImageData, properties: &BackendProperties) {
        let mut boundary = image.pixel_boundary_path.clone();
        boundary.transform_inplace(&image.flip_matrix().then(&image.transform));
        let data = RecordData::Image {
            image: image.clone(),
            boundary,
        };
        self.store(data, properties);
    }

    fn clear(&mut self) {
        warn!("clearing a recorder is not supported");
    }

    fn max_flattening_distance(&self) -> f64 {
        self.config.max_flattening_distance
    }
}

/// Implement [`Backend`](crate::Backend) for a struct by forwarding every
/// call to its [`Recorder`] field.
///
/// ```ignore
/// struct MyExporter {
///     recorder: Recorder,
/// }
///
/// cadplot_render::delegate_backend!(MyExporter, recorder);
/// ```
#[macro_export]
macro_rules! delegate_backend {
    ($ty:ty, $field:ident) => {
        impl $crate::Backend for $ty {
            fn configure(&mut self, config: &$crate::Configuration) {
                $crate::Backend::configure(&mut self.$field, config);
            }

            fn enter_entity(&mut self, handle: &str) {
                $crate::Backend::enter_entity(&mut self.$field, handle);
            }

            fn exit_entity(&mut self, handle: &str) {
                $crate::Backend::exit_entity(&mut self.$field, handle);
            }

            fn set_background(&mut self, color: $crate::Color) {
                $crate::Backend::set_background(&mut self.$field, color);
            }

            fn draw_point(&mut self, pos: $crate::__macro_support::Point2, properties: &$crate::BackendProperties) {
                $crate::Backend::draw_point(&mut self.$field, pos, properties);
            }

            fn draw_line(
                &mut self,
                start: $crate::__macro_support::Point2,
                end: $crate::__macro_support::Point2,
                properties: &$crate::BackendProperties,
            ) {
                $crate::Backend::draw_line(&mut self.$field, start, end, properties);
            }

            fn draw_solid_lines(
                &mut self,
                lines: &[($crate::__macro_support::Point2, $crate::__macro_support::Point2)],
                properties: &$crate::BackendProperties,
            ) {
                $crate::Backend::draw_solid_lines(&mut self.$field, lines, properties);
            }

            fn draw_path(&mut self, path: &$crate::__macro_support::Path2d, properties: &$crate::BackendProperties) {
                $crate::Backend::draw_path(&mut self.$field, path, properties);
            }

            fn draw_filled_paths(
                &mut self,
                paths: &[$crate::__macro_support::Path2d],
                properties: &$crate::BackendProperties,
            ) {
                $crate::Backend::draw_filled_paths(&mut self.$field, paths, properties);
            }

            fn draw_filled_polygon(
                &mut self,
                points: &$crate::__macro_support::Points2d,
                properties: &$crate::BackendProperties,
            ) {
                $crate::Backend::draw_filled_polygon(&mut self.$field, points, properties);
            }

            fn draw_image(&mut self, image: &$crate::ImageData, properties: &$crate::BackendProperties) {
                $crate::Backend::draw_image(&mut self.$field, image, properties);
            }

            fn clear(&mut self) {
                $crate::Backend::clear(&mut self.$field);
            }

            fn finalize(&mut self) {
                $crate::Backend::finalize(&mut self.$field);
            }

            fn max_flattening_distance(&self) -> f64 {
                $crate::Backend::max_flattening_distance(&self.$field)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PixelBuffer;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn props(color: Color, handle: &str) -> BackendProperties {
        BackendProperties {
            color,
            handle: handle.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_property_table_is_deduplicated() {
        let mut recorder = Recorder::new();
        recorder.draw_line(p(0.0, 0.0), p(1.0, 0.0), &props(Color::BLACK, "A"));
        recorder.draw_line(p(0.0, 0.0), p(1.0, 0.0), &props(Color::BLACK, "B"));
        recorder.draw_point(p(0.0, 0.0), &props(Color::WHITE, "C"));
        assert_eq!(recorder.records().len(), 3);
        assert_eq!(recorder.property_count(), 2);
        // the handle is stored per record, not per style
        assert_eq!(recorder.records()[1].handle, "B");
    }

    #[test]
    fn test_empty_primitives_are_skipped() {
        let mut recorder = Recorder::new();
        let bp = BackendProperties::default();
        recorder.draw_solid_lines(&[], &bp);
        recorder.draw_filled_paths(&[Path2d::default()], &bp);
        recorder.draw_filled_polygon(&Points2d::default(), &bp);
        assert!(recorder.records().is_empty());
    }

    #[test]
    fn test_solid_lines_buffer() {
        let mut recorder = Recorder::new();
        let lines = [(p(0.0, 0.0), p(1.0, 0.0)), (p(2.0, 0.0), p(3.0, 0.0))];
        recorder.draw_solid_lines(&lines, &BackendProperties::default());
        match &recorder.records()[0].data {
            RecordData::SolidLines(buffer) => assert_eq!(buffer.len(), 4),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_image_boundary_in_drawing_space() {
        let mut recorder = Recorder::new();
        let image = ImageData::new(
            PixelBuffer::filled(4, 2, Color::WHITE),
            Affine2::translation(10.0, 20.0),
        );
        recorder.draw_image(&image, &BackendProperties::default());
        let bbox = recorder.records()[0].bbox();
        assert_relative_eq!(bbox.extmin.x, 10.0);
        assert_relative_eq!(bbox.extmin.y, 20.0);
        assert_relative_eq!(bbox.extmax.x, 14.0);
        assert_relative_eq!(bbox.extmax.y, 22.0);
    }

    #[test]
    fn test_image_transform_follows_record() {
        let mut recorder = Recorder::new();
        let image = ImageData::new(PixelBuffer::filled(4, 2, Color::WHITE), Affine2::identity());
        recorder.draw_image(&image, &BackendProperties::default());
        let mut record = recorder.records()[0].clone();
        record.transform_inplace(&Affine2::translation(5.0, 0.0));
        let RecordData::Image { image, .. } = &record.data else {
            panic!("expected an image record");
        };
        let origin = image.transform.apply_point(&p(0.0, 0.0));
        assert_relative_eq!(origin.x, 5.0);
        assert_relative_eq!(record.bbox().extmin.x, 5.0);
    }

    struct Exporter {
        recorder: Recorder,
    }

    crate::delegate_backend!(Exporter, recorder);

    #[test]
    fn test_delegated_backend_records() {
        let mut exporter = Exporter {
            recorder: Recorder::new(),
        };
        exporter.configure(&Configuration::default().with_max_flattening_distance(0.5));
        exporter.draw_line(p(0.0, 0.0), p(1.0, 0.0), &BackendProperties::default());
        assert_eq!(exporter.recorder.records().len(), 1);
        assert_eq!(exporter.max_flattening_distance(), 0.5);
    }

    #[test]
    fn test_last_background_wins() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.background(), Color::BLACK);
        recorder.set_background(Color::WHITE);
        recorder.set_background(Color::rgb(1, 2, 3));
        assert_eq!(recorder.background(), Color::rgb(1, 2, 3));
    }
}
