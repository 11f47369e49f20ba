//! Replay of captured records.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cadplot_clip::ClipShape;
use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{Affine2, BoundingBox2d, Point2};
use log::{debug, trace, warn};

use crate::backend::Backend;
use crate::color::Color;
use crate::config::Configuration;
use crate::properties::BackendProperties;
use crate::recorder::{Record, RecordData};
use crate::{RenderError, Result};

/// Replay hook, called with the properties of every record. May change the
/// properties; returning `false` skips the record.
pub type Override = dyn Fn(&mut BackendProperties) -> bool + Send + Sync;

/// Smallest crop rectangle side length, smaller rectangles remove everything.
const MIN_CROP_SIZE: f64 = 1e-12;

/// Records inside the crop rectangle grown by this tolerance are kept
/// unchanged, clipped vertices may lie marginally outside the border.
const CROP_TOLERANCE: f64 = 1e-9;

/// Replays records captured by a [`Recorder`](crate::Recorder).
///
/// Cloning a player copies the records, the property table is shared.
/// Records shared with other players are copied before the first
/// modification, so a recording can be replayed any number of times.
#[derive(Debug)]
pub struct Player {
    records: Arc<Vec<Record>>,
    properties: Arc<HashMap<u64, BackendProperties>>,
    background: Color,
    config: Configuration,
    bbox: OnceLock<BoundingBox2d>,
}

impl Clone for Player {
    fn clone(&self) -> Self {
        Self {
            records: Arc::new(self.records.as_ref().clone()),
            properties: Arc::clone(&self.properties),
            background: self.background,
            config: self.config.clone(),
            bbox: self.bbox.clone(),
        }
    }
}

impl Player {
    /// Player for `records`; every record's property hash must be a key
    /// of `properties`.
    pub fn new(
        records: Arc<Vec<Record>>,
        properties: Arc<HashMap<u64, BackendProperties>>,
        background: Color,
        config: Configuration,
    ) -> Self {
        Self {
            records,
            properties,
            background,
            config,
            bbox: OnceLock::new(),
        }
    }

    /// The records in capture order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Background color.
    pub fn background(&self) -> Color {
        self.background
    }

    /// Configuration of the captured pipeline.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Returns `true` if the records are shared with another player or the
    /// recorder; they are copied on the next modification.
    pub fn has_shared_recording(&self) -> bool {
        Arc::strong_count(&self.records) > 1
    }

    /// Backend properties of `record`, with the record's handle.
    pub fn backend_properties(&self, record: &Record) -> Result<BackendProperties> {
        let properties = self
            .properties
            .get(&record.property_hash)
            .ok_or(RenderError::UnknownProperties(record.property_hash))?;
        Ok(BackendProperties {
            handle: record.handle.clone(),
            ..properties.clone()
        })
    }

    /// Records with their backend properties, in capture order.
    pub fn recordings(&self) -> impl Iterator<Item = Result<(BackendProperties, &Record)>> + '_ {
        self.records
            .iter()
            .map(|record| Ok((self.backend_properties(record)?, record)))
    }

    /// Replay all records onto `backend`.
    ///
    /// The backend is configured, the background set, and the backend
    /// finalized after the last record.
    pub fn replay<B: Backend + ?Sized>(&self, backend: &mut B, override_fn: Option<&Override>) -> Result<()> {
        backend.configure(&self.config);
        backend.set_background(self.background);
        for record in self.records.iter() {
            let mut properties = self.backend_properties(record)?;
            if let Some(override_fn) = override_fn {
                if !override_fn(&mut properties) {
                    trace!("record of {:?} skipped by override", record.handle);
                    continue;
                }
            }
            match &record.data {
                RecordData::Points(points) => match points.vertices() {
                    [] => {}
                    [pos] => backend.draw_point(*pos, &properties),
                    [start, end] => backend.draw_line(*start, *end, &properties),
                    _ => backend.draw_filled_polygon(points, &properties),
                },
                RecordData::SolidLines(buffer) => {
                    let lines: Vec<(Point2, Point2)> = buffer.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
                    backend.draw_solid_lines(&lines, &properties);
                }
                RecordData::Path(path) => backend.draw_path(path, &properties),
                RecordData::FilledPaths(paths) => backend.draw_filled_paths(paths, &properties),
                RecordData::Image { image, .. } => backend.draw_image(image, &properties),
            }
        }
        backend.finalize();
        Ok(())
    }

    /// Bounding box of all records, undefined for no records. Computed on
    /// first use and cached.
    pub fn bbox(&self) -> BoundingBox2d {
        *self.bbox.get_or_init(|| {
            self.records.iter().fold(BoundingBox2d::empty(), |mut bbox, record| {
                bbox.extend(&record.bbox());
                bbox
            })
        })
    }

    /// Transform all records in place.
    pub fn transform(&mut self, m: &Affine2) {
        for record in Arc::make_mut(&mut self.records).iter_mut() {
            record.transform_inplace(m);
        }
        if let Some(bbox) = self.bbox.take() {
            self.bbox = OnceLock::from(bbox.transformed(m));
        }
    }

    /// Crop all records by the rectangle `p1`, `p2`; curves crossing the
    /// border are flattened with `distance`.
    ///
    /// A rectangle with zero width or height removes all records.
    pub fn crop_rect(&mut self, p1: Point2, p2: Point2, distance: f64) {
        let crop_box = BoundingBox2d::new(p1, p2);
        if !crop_box.has_data() {
            return;
        }
        let records = Arc::make_mut(&mut self.records);
        self.bbox = OnceLock::new();
        let size = crop_box.size();
        if size.x < MIN_CROP_SIZE || size.y < MIN_CROP_SIZE {
            records.clear();
            return;
        }
        let shape = match ClipShape::rect(&[p1, p2]) {
            Ok(shape) => shape,
            Err(err) => {
                warn!("invalid crop rectangle: {err}");
                records.clear();
                return;
            }
        };
        let mut keep_box = crop_box;
        keep_box.grow(CROP_TOLERANCE);
        let count = records.len();
        let cropped: Vec<Record> = std::mem::take(records)
            .into_iter()
            .flat_map(|record| crop_record(record, &shape, &crop_box, &keep_box, distance))
            .collect();
        debug!("crop_rect: {count} records -> {}", cropped.len());
        *records = cropped;
    }
}

/// Crop one record; returns the visible parts as records with the same
/// properties.
fn crop_record(
    record: Record,
    shape: &ClipShape,
    crop_box: &BoundingBox2d,
    keep_box: &BoundingBox2d,
    distance: f64,
) -> Vec<Record> {
    let bbox = record.bbox();
    if matches!(&record.data, RecordData::Points(points) if points.len() == 1) {
        // points on the border are kept
        return if crop_box.has_overlap(&bbox) { vec![record] } else { Vec::new() };
    }
    if !crop_box.has_intersection(&bbox) {
        return Vec::new();
    }
    if keep_box.contains(&bbox) {
        return vec![record];
    }
    match &record.data {
        RecordData::Points(points) => match points.vertices() {
            [start, end] => shape
                .clip_line(*start, *end)
                .into_iter()
                .map(|(s, e)| record.with_data(RecordData::Points(Points2d::new(vec![s, e]))))
                .collect(),
            _ => shape
                .clip_polygon(points.clone())
                .into_iter()
                .filter(|part| !part.is_empty())
                .map(|part| record.with_data(RecordData::Points(part)))
                .collect(),
        },
        RecordData::SolidLines(buffer) => {
            let clipped: Vec<Point2> = buffer
                .chunks_exact(2)
                .flat_map(|pair| shape.clip_line(pair[0], pair[1]))
                .flat_map(|(s, e)| [s, e])
                .collect();
            if clipped.is_empty() {
                Vec::new()
            } else {
                vec![record.with_data(RecordData::SolidLines(clipped))]
            }
        }
        RecordData::Path(path) => shape
            .clip_paths(std::slice::from_ref(path), distance)
            .into_iter()
            .map(|part| record.with_data(RecordData::Path(part)))
            .collect(),
        RecordData::FilledPaths(paths) => {
            let (inside, crossing): (Vec<Path2d>, Vec<Path2d>) =
                paths.iter().cloned().partition(|path| keep_box.contains(&path.bbox()));
            let mut clipped = shape.clip_filled_paths(&crossing, distance);
            clipped.extend(inside);
            if clipped.is_empty() {
                Vec::new()
            } else {
                vec![record.with_data(RecordData::FilledPaths(clipped))]
            }
        }
        // partially visible images are kept, the page clips them
        RecordData::Image { .. } => vec![record.clone()],
    }
}
