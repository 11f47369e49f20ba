//! Parallel tile export.
//!
//! The content extents are split into a grid. Every tile crops its own
//! copy of the recording and replays it onto its own backend on the rayon
//! thread pool; backends are never shared between tiles.

use cadplot_math::{BoundingBox2d, Point2};
use cadplot_render::{Backend, Player};
use log::debug;
use rayon::prelude::*;

use crate::Result;

/// Content extents below this size are flat.
const FLAT_EXTENT: f64 = 1e-9;

/// Tile boxes of a `rows` x `cols` grid over `bbox` in row-major order,
/// row 0 at the top.
///
/// A flat `bbox`, such as the extents of horizontal lines only, is given
/// square tiles in its flat direction with the content centered in the
/// first row or column.
pub fn tile_boxes(bbox: &BoundingBox2d, rows: usize, cols: usize) -> Vec<BoundingBox2d> {
    if rows == 0 || cols == 0 || !bbox.has_data() {
        return Vec::new();
    }
    let bbox = expand_flat_extents(bbox, rows, cols);
    let size = bbox.size();
    let width = size.x / cols as f64;
    let height = size.y / rows as f64;
    (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (row, col)))
        .map(|(row, col)| {
            let left = bbox.extmin.x + col as f64 * width;
            let top = bbox.extmax.y - row as f64 * height;
            BoundingBox2d::new(Point2::new(left, top - height), Point2::new(left + width, top))
        })
        .collect()
}

fn expand_flat_extents(bbox: &BoundingBox2d, rows: usize, cols: usize) -> BoundingBox2d {
    let size = bbox.size();
    let flat_x = size.x < FLAT_EXTENT;
    let flat_y = size.y < FLAT_EXTENT;
    let mut extmin = bbox.extmin;
    let mut extmax = bbox.extmax;
    if flat_x {
        let width = if flat_y { 1.0 } else { size.y / rows as f64 };
        extmin.x -= width / 2.0;
        extmax.x = extmin.x + width * cols as f64;
    }
    if flat_y {
        let height = if flat_x { 1.0 } else { size.x / cols as f64 };
        extmax.y += height / 2.0;
        extmin.y = extmax.y - height * rows as f64;
    }
    if flat_x || flat_y {
        debug!("flat content extents {size:?}, tile grid expanded");
    }
    BoundingBox2d::new(extmin, extmax)
}

/// Crop and replay `player` per tile onto a backend from
/// `make_backend(row, col, tile_box)`, tiles in parallel.
///
/// Returns the backends in row-major order, row 0 at the top. An empty
/// grid or recording gives no backends.
pub fn export_tiles<B, F>(player: &Player, rows: usize, cols: usize, make_backend: F) -> Result<Vec<B>>
where
    B: Backend + Send,
    F: Fn(usize, usize, &BoundingBox2d) -> B + Sync,
{
    let boxes = tile_boxes(&player.bbox(), rows, cols);
    debug!("export {} tiles ({rows} x {cols})", boxes.len());
    let distance = player.config().max_flattening_distance;
    let backends = boxes
        .par_iter()
        .enumerate()
        .map(|(index, tile)| {
            let mut backend = make_backend(index / cols, index % cols, tile);
            let mut tile_player = player.clone();
            tile_player.crop_rect(tile.extmin, tile.extmax, distance);
            tile_player.replay(&mut backend, None)?;
            Ok(backend)
        })
        .collect::<cadplot_render::Result<Vec<B>>>()?;
    Ok(backends)
}
