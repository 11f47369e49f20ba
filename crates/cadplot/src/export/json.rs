//! JSON backend with a custom entity scheme.
//!
//! The output is a list of entities:
//!
//! ```text
//! {
//!     "type": "point" | "lines" | "path" | "filled-paths" | "filled-polygon",
//!     "properties": {"color": "#RRGGBB[AA]", "stroke-width": 0.25, "layer": "0"},
//!     "geometry": ...
//! }
//! ```
//!
//! Geometry by type:
//! - `point`: `[x, y]`
//! - `lines`: `[[x0, y0, x1, y1], ...]`, points have equal start and end
//! - `path`: SVG-like absolute commands `["M", x, y]`, `["L", x, y]`,
//!   `["Q", cx, cy, x, y]`, `["C", c1x, c1y, c2x, c2y, x, y]`, `["Z"]`;
//!   every path is a single continuous geometry
//! - `filled-paths`: one command list per path, each closed by `Z`
//! - `filled-polygon`: `[[x, y], ...]`, first vertex equals last vertex
//!
//! Linetypes are resolved into solid lines, coordinates are drawing units.
//! Raster images and the background are not exported.

use cadplot_geom::{single_paths, Path2d, PathElement, Points2d};
use cadplot_math::{is_close, is_point_in_polygon_2d, Point2, PolygonRelation, Tolerance};
use cadplot_render::{
    round_to, Backend, BackendProperties, Color, Configuration, ImageData, MIN_LINEWEIGHT_MM,
};
use log::debug;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::Result;

/// Properties of an exported entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonProperties {
    /// `#RRGGBB`, `#RRGGBBAA` for transparent colors.
    pub color: String,
    /// Stroke width in mm.
    #[serde(rename = "stroke-width")]
    pub stroke_width: f64,
    /// Layer name.
    pub layer: String,
}

/// An absolute path command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    /// `["M", x, y]`
    MoveTo(Point2),
    /// `["L", x, y]`
    LineTo(Point2),
    /// `["Q", cx, cy, x, y]`
    QuadTo {
        /// Control point.
        ctrl: Point2,
        /// End point.
        end: Point2,
    },
    /// `["C", c1x, c1y, c2x, c2y, x, y]`
    CubicTo {
        /// First control point.
        ctrl1: Point2,
        /// Second control point.
        ctrl2: Point2,
        /// End point.
        end: Point2,
    },
    /// `["Z"]`
    Close,
}

impl Serialize for PathCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (code, points) = match *self {
            PathCommand::MoveTo(p) => ("M", vec![p]),
            PathCommand::LineTo(p) => ("L", vec![p]),
            PathCommand::QuadTo { ctrl, end } => ("Q", vec![ctrl, end]),
            PathCommand::CubicTo { ctrl1, ctrl2, end } => ("C", vec![ctrl1, ctrl2, end]),
            PathCommand::Close => ("Z", Vec::new()),
        };
        let mut seq = serializer.serialize_seq(Some(1 + points.len() * 2))?;
        seq.serialize_element(code)?;
        for p in &points {
            seq.serialize_element(&p.x)?;
            seq.serialize_element(&p.y)?;
        }
        seq.end()
    }
}

/// An exported entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JsonEntity {
    /// A single point.
    Point {
        /// Entity properties.
        properties: JsonProperties,
        /// `[x, y]`
        geometry: [f64; 2],
    },
    /// Line segments with common properties.
    Lines {
        /// Entity properties.
        properties: JsonProperties,
        /// `[x0, y0, x1, y1]` per segment.
        geometry: Vec<[f64; 4]>,
    },
    /// A continuous path without filling.
    Path {
        /// Entity properties.
        properties: JsonProperties,
        /// Path commands, starting with a move.
        geometry: Vec<PathCommand>,
    },
    /// Filled paths, exterior paths and holes mixed.
    FilledPaths {
        /// Entity properties.
        properties: JsonProperties,
        /// Closed command list per path.
        geometry: Vec<Vec<PathCommand>>,
    },
    /// A filled polygon, explicitly closed.
    FilledPolygon {
        /// Entity properties.
        properties: JsonProperties,
        /// Vertices, the last one equals the first one.
        geometry: Vec<[f64; 2]>,
    },
}

/// Live backend which collects [`JsonEntity`] values.
#[derive(Debug, Clone)]
pub struct CustomJsonBackend {
    entities: Vec<JsonEntity>,
    orient_paths: bool,
    min_lineweight: f64,
    lineweight_scaling: f64,
    fixed_lineweight: Option<f64>,
}

impl Default for CustomJsonBackend {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            orient_paths: false,
            min_lineweight: MIN_LINEWEIGHT_MM,
            lineweight_scaling: 1.0,
            fixed_lineweight: None,
        }
    }
}

impl CustomJsonBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Orient filled paths: exterior paths counter-clockwise, holes
    /// clockwise.
    pub fn with_oriented_paths(mut self) -> Self {
        self.orient_paths = true;
        self
    }

    /// The collected entities.
    pub fn entities(&self) -> &[JsonEntity] {
        &self.entities
    }

    /// The entities as JSON value.
    pub fn get_json_data(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.entities)?)
    }

    /// The entities as JSON string indented by 2 spaces.
    pub fn get_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entities)?)
    }

    fn make_properties(&self, properties: &BackendProperties) -> JsonProperties {
        let stroke_width = match self.fixed_lineweight {
            Some(width) => width,
            None => self.min_lineweight.max(properties.lineweight * self.lineweight_scaling),
        };
        JsonProperties {
            color: properties.color.to_hex(),
            stroke_width: round_to(stroke_width, 2),
            layer: properties.layer.clone(),
        }
    }
}

impl Backend for CustomJsonBackend {
    fn configure(&mut self, config: &Configuration) {
        if let Some(min_lineweight) = config.min_lineweight_mm() {
            self.min_lineweight = min_lineweight;
        }
        self.lineweight_scaling = config.lineweight_scaling;
        self.fixed_lineweight = (self.lineweight_scaling == 0.0).then_some(self.min_lineweight);
    }

    fn set_background(&mut self, _color: Color) {}

    fn draw_point(&mut self, pos: Point2, properties: &BackendProperties) {
        let properties = self.make_properties(properties);
        self.entities.push(JsonEntity::Point {
            properties,
            geometry: [pos.x, pos.y],
        });
    }

    fn draw_line(&mut self, start: Point2, end: Point2, properties: &BackendProperties) {
        self.draw_solid_lines(&[(start, end)], properties);
    }

    fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
        if lines.is_empty() {
            return;
        }
        let properties = self.make_properties(properties);
        self.entities.push(JsonEntity::Lines {
            properties,
            geometry: lines.iter().map(|(s, e)| [s.x, s.y, e.x, e.y]).collect(),
        });
    }

    fn draw_path(&mut self, path: &Path2d, properties: &BackendProperties) {
        for sub_path in path.sub_paths() {
            let geometry = make_json_path(&sub_path, false);
            if geometry.is_empty() {
                continue;
            }
            let properties = self.make_properties(properties);
            self.entities.push(JsonEntity::Path { properties, geometry });
        }
    }

    fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
        let mut paths = single_paths(paths);
        if self.orient_paths {
            orient_paths(&mut paths);
        }
        let geometry: Vec<Vec<PathCommand>> = paths
            .iter()
            .map(|path| make_json_path(path, true))
            .filter(|commands| !commands.is_empty())
            .collect();
        if geometry.is_empty() {
            return;
        }
        let properties = self.make_properties(properties);
        self.entities.push(JsonEntity::FilledPaths { properties, geometry });
    }

    fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties) {
        let vertices = points.vertices();
        let [first, .., last] = vertices else {
            return;
        };
        if vertices.len() < 3 {
            debug!("filled polygon with less than 3 vertices dropped");
            return;
        }
        let mut geometry: Vec<[f64; 2]> = vertices.iter().map(|v| [v.x, v.y]).collect();
        if !is_close(first, last, Tolerance::VERTEX.linear) {
            geometry.push([first.x, first.y]);
        }
        let properties = self.make_properties(properties);
        self.entities.push(JsonEntity::FilledPolygon { properties, geometry });
    }

    fn draw_image(&mut self, _image: &ImageData, _properties: &BackendProperties) {}

    fn clear(&mut self) {
        self.entities.clear();
    }
}

/// Absolute commands of a single path; an empty path gives no commands.
pub fn make_json_path(path: &Path2d, close: bool) -> Vec<PathCommand> {
    let Some(start) = path.start() else {
        return Vec::new();
    };
    if path.is_empty() {
        return Vec::new();
    }
    let mut commands = vec![PathCommand::MoveTo(start)];
    commands.extend(path.commands().map(|element| match element {
        PathElement::MoveTo(p) => PathCommand::MoveTo(p),
        PathElement::LineTo(p) => PathCommand::LineTo(p),
        PathElement::Curve3To { ctrl, end } => PathCommand::QuadTo { ctrl, end },
        PathElement::Curve4To { ctrl1, ctrl2, end } => PathCommand::CubicTo { ctrl1, ctrl2, end },
    }));
    if close {
        commands.push(PathCommand::Close);
    }
    commands
}

/// Exterior paths counter-clockwise, holes clockwise; the nesting level is
/// the count of paths enclosing the start point.
fn orient_paths(paths: &mut [Path2d]) {
    let polygons: Vec<Vec<Point2>> = paths.iter().map(|p| p.flattening(0.01, 4).collect()).collect();
    for (index, path) in paths.iter_mut().enumerate() {
        let Some(start) = path.start() else {
            continue;
        };
        let level = polygons
            .iter()
            .enumerate()
            .filter(|(other, polygon)| {
                *other != index && is_point_in_polygon_2d(&start, polygon, 1e-9) == PolygonRelation::Inside
            })
            .count();
        let oriented = if level % 2 == 0 {
            path.counter_clockwise()
        } else {
            path.clockwise()
        };
        if let Err(err) = oriented {
            debug!("path orientation skipped: {err}");
        }
    }
}
