//! Contiguous 2D path buffer with line, quadratic and cubic segments.
//!
//! Vertex layout: the start point, then per command its vertices in
//! order. `Curve3To` stores `[ctrl, end]`, `Curve4To` stores
//! `[ctrl1, ctrl2, end]`. A `MoveTo` starts a new sub-path and is never
//! followed by another `MoveTo`.

use cadplot_math::{has_clockwise_orientation, is_close, Affine2, BoundingBox2d, Point2, Tolerance};

use crate::bezier::{Bezier3P, Bezier4P};
use crate::error::{GeometryError, Result};
use crate::points::Points2d;

/// Path command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start a new sub-path.
    MoveTo,
    /// Straight line.
    LineTo,
    /// Quadratic Bezier curve.
    Curve3To,
    /// Cubic Bezier curve.
    Curve4To,
}

impl Command {
    /// Number of vertices this command consumes from the vertex buffer.
    pub fn vertex_count(self) -> usize {
        match self {
            Command::MoveTo | Command::LineTo => 1,
            Command::Curve3To => 2,
            Command::Curve4To => 3,
        }
    }
}

/// A decoded path command with its vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    /// Start a new sub-path at the point.
    MoveTo(Point2),
    /// Straight line to the point.
    LineTo(Point2),
    /// Quadratic Bezier curve.
    Curve3To {
        /// Control point.
        ctrl: Point2,
        /// End point.
        end: Point2,
    },
    /// Cubic Bezier curve.
    Curve4To {
        /// First control point.
        ctrl1: Point2,
        /// Second control point.
        ctrl2: Point2,
        /// End point.
        end: Point2,
    },
}

impl PathElement {
    /// End point of the element.
    pub fn end(&self) -> Point2 {
        match *self {
            PathElement::MoveTo(p) | PathElement::LineTo(p) => p,
            PathElement::Curve3To { end, .. } | PathElement::Curve4To { end, .. } => end,
        }
    }
}

/// A 2D path stored as a vertex buffer plus a command buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path2d {
    vertices: Vec<Point2>,
    commands: Vec<Command>,
}

impl Path2d {
    /// Create a path starting at `start` without any segments.
    pub fn new(start: Point2) -> Self {
        Self {
            vertices: vec![start],
            commands: Vec::new(),
        }
    }

    /// Create a polyline path from `vertices`; with `close` the last
    /// vertex is connected back to the first if they differ.
    pub fn from_vertices(vertices: impl IntoIterator<Item = Point2>, close: bool) -> Self {
        let mut vertices: Vec<Point2> = vertices.into_iter().collect();
        if vertices.is_empty() {
            return Self::default();
        }
        if close && !is_close(&vertices[0], &vertices[vertices.len() - 1], Tolerance::VERTEX.linear) {
            vertices.push(vertices[0]);
        }
        let commands = vec![Command::LineTo; vertices.len() - 1];
        Self { vertices, commands }
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if the path has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Start point, `None` for a path without vertices.
    pub fn start(&self) -> Option<Point2> {
        self.vertices.first().copied()
    }

    /// End point, `None` for a path without vertices.
    pub fn end(&self) -> Option<Point2> {
        self.vertices.last().copied()
    }

    /// All control vertices including the start point.
    pub fn control_vertices(&self) -> &[Point2] {
        &self.vertices
    }

    /// Command codes.
    pub fn command_codes(&self) -> &[Command] {
        &self.commands
    }

    fn push(&mut self, command: Command, points: &[Point2]) {
        if self.vertices.is_empty() {
            self.vertices.push(Point2::origin());
        }
        self.vertices.extend_from_slice(points);
        self.commands.push(command);
    }

    /// Start a new sub-path at `p`. Moving an empty path or repeating a
    /// move just replaces the target point.
    pub fn move_to(&mut self, p: Point2) {
        if self.commands.is_empty() {
            self.vertices.clear();
            self.vertices.push(p);
        } else if self.commands.last() == Some(&Command::MoveTo) {
            if let Some(last) = self.vertices.last_mut() {
                *last = p;
            }
        } else {
            self.push(Command::MoveTo, &[p]);
        }
    }

    /// Append a straight line to `p`.
    pub fn line_to(&mut self, p: Point2) {
        self.push(Command::LineTo, &[p]);
    }

    /// Append a quadratic Bezier curve to `end`.
    pub fn curve3_to(&mut self, end: Point2, ctrl: Point2) {
        self.push(Command::Curve3To, &[ctrl, end]);
    }

    /// Append a cubic Bezier curve to `end`.
    pub fn curve4_to(&mut self, end: Point2, ctrl1: Point2, ctrl2: Point2) {
        self.push(Command::Curve4To, &[ctrl1, ctrl2, end]);
    }

    /// Connect the end point back to the start point if the path is open.
    pub fn close(&mut self) {
        if let Some(start) = self.start() {
            if !self.is_closed() {
                self.line_to(start);
            }
        }
    }

    /// Iterate the decoded commands.
    pub fn commands(&self) -> impl Iterator<Item = PathElement> + '_ {
        let vertices = &self.vertices;
        let mut index = 1;
        self.commands.iter().map(move |cmd| {
            let element = match cmd {
                Command::MoveTo => PathElement::MoveTo(vertices[index]),
                Command::LineTo => PathElement::LineTo(vertices[index]),
                Command::Curve3To => PathElement::Curve3To {
                    ctrl: vertices[index],
                    end: vertices[index + 1],
                },
                Command::Curve4To => PathElement::Curve4To {
                    ctrl1: vertices[index],
                    ctrl2: vertices[index + 1],
                    end: vertices[index + 2],
                },
            };
            index += cmd.vertex_count();
            element
        })
    }

    /// Returns `true` if the path contains more than one sub-path.
    pub fn has_sub_paths(&self) -> bool {
        self.commands.contains(&Command::MoveTo)
    }

    /// Returns `true` if the start point is close to the end point.
    pub fn is_closed(&self) -> bool {
        if self.vertices.len() > 1 {
            is_close(&self.vertices[0], &self.vertices[self.vertices.len() - 1], Tolerance::VERTEX.linear)
        } else {
            false
        }
    }

    /// Returns `true` if the path has any line segments.
    pub fn has_lines(&self) -> bool {
        self.commands.contains(&Command::LineTo)
    }

    /// Returns `true` if the path has any curve segments.
    pub fn has_curves(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, Command::Curve3To | Command::Curve4To))
    }

    /// Split into single paths at every `MoveTo`. An empty path yields
    /// nothing, a single path yields a copy of itself.
    pub fn sub_paths(&self) -> Vec<Path2d> {
        if self.commands.is_empty() {
            return Vec::new();
        }
        if !self.has_sub_paths() {
            return vec![self.clone()];
        }
        let mut sub_paths = Vec::new();
        let mut vtx_start = 0;
        let mut vtx_index = 0;
        let mut cmd_start = 0;
        for (cmd_index, cmd) in self.commands.iter().enumerate() {
            if *cmd == Command::MoveTo {
                sub_paths.push(Path2d {
                    vertices: self.vertices[vtx_start..=vtx_index].to_vec(),
                    commands: self.commands[cmd_start..cmd_index].to_vec(),
                });
                vtx_index += 1;
                vtx_start = vtx_index;
                cmd_start = cmd_index + 1;
            } else {
                vtx_index += cmd.vertex_count();
            }
        }
        if self.commands.last() != Some(&Command::MoveTo) {
            sub_paths.push(Path2d {
                vertices: self.vertices[vtx_start..=vtx_index].to_vec(),
                commands: self.commands[cmd_start..].to_vec(),
            });
        }
        sub_paths
    }

    /// Orientation of a single path, based on its control vertices.
    ///
    /// Fails with [`GeometryError::InvalidGeometry`] for multi-paths.
    pub fn has_clockwise_orientation(&self) -> Result<bool> {
        if self.has_sub_paths() {
            return Err(GeometryError::InvalidGeometry(
                "can't detect orientation of a multi-path".into(),
            ));
        }
        Ok(has_clockwise_orientation(&self.vertices))
    }

    /// Reverse the path orientation in place.
    pub fn reverse(&mut self) {
        if self.commands.is_empty() {
            return;
        }
        if self.commands.last() == Some(&Command::MoveTo) {
            // a trailing move only relocates the start point after reversal
            self.commands.pop();
            self.vertices.pop();
        }
        self.commands.reverse();
        self.vertices.reverse();
    }

    /// Returns a reversed copy.
    pub fn reversed(&self) -> Path2d {
        let mut path = self.clone();
        path.reverse();
        path
    }

    /// Apply clockwise orientation in place.
    pub fn clockwise(&mut self) -> Result<()> {
        if !self.has_clockwise_orientation()? {
            self.reverse();
        }
        Ok(())
    }

    /// Apply counter-clockwise orientation in place.
    pub fn counter_clockwise(&mut self) -> Result<()> {
        if self.has_clockwise_orientation()? {
            self.reverse();
        }
        Ok(())
    }

    /// Flatten the path into vertices on demand. Curves are approximated
    /// with at least `segments` segments and a maximum chord distance of
    /// `distance`; `MoveTo` targets are emitted like line vertices.
    pub fn flattening(&self, distance: f64, segments: usize) -> impl Iterator<Item = Point2> + '_ {
        let first = if self.commands.is_empty() {
            None
        } else {
            self.start()
        };
        let mut start = first.unwrap_or_else(Point2::origin);
        first.into_iter().chain(self.commands().flat_map(move |element| {
            let from = start;
            start = element.end();
            let points: Box<dyn Iterator<Item = Point2>> = match element {
                PathElement::MoveTo(p) | PathElement::LineTo(p) => Box::new(std::iter::once(p)),
                PathElement::Curve3To { ctrl, end } => {
                    Box::new(Bezier3P::new(from, ctrl, end).flattening(distance, segments).skip(1))
                }
                PathElement::Curve4To { ctrl1, ctrl2, end } => Box::new(
                    Bezier4P::new(from, ctrl1, ctrl2, end)
                        .flattening(distance, segments)
                        .skip(1),
                ),
            };
            points
        }))
    }

    /// Flatten a single path into a point buffer.
    ///
    /// Fails with [`GeometryError::InvalidGeometry`] for multi-paths.
    pub fn to_points2d(&self, distance: f64, segments: usize) -> Result<Points2d> {
        if self.has_sub_paths() {
            return Err(GeometryError::InvalidGeometry(
                "can't convert a multi-path into a single point buffer".into(),
            ));
        }
        Ok(self.flattening(distance, segments).collect())
    }

    /// Transform all control vertices in place.
    pub fn transform_inplace(&mut self, m: &Affine2) {
        m.apply_inplace(&mut self.vertices);
    }

    /// Minimum and maximum corner of the control vertices.
    pub fn extents(&self) -> Option<(Point2, Point2)> {
        let bbox = self.bbox();
        bbox.has_data().then_some((bbox.extmin, bbox.extmax))
    }

    /// Bounding box of the control vertices, empty for an empty path.
    ///
    /// The control polygon encloses every Bezier curve, so this box is
    /// conservative for curved paths.
    pub fn bbox(&self) -> BoundingBox2d {
        BoundingBox2d::from_points(self.vertices.iter())
    }

    /// Append `paths`, connecting non-coincident sequential paths by a
    /// `MoveTo` command.
    pub fn extend(&mut self, paths: &[Path2d]) {
        let mut paths = paths.iter().filter(|p| !p.is_empty());
        if self.is_empty() {
            match paths.next() {
                Some(first) => *self = first.clone(),
                None => return,
            }
        }
        for next_path in paths {
            let (Some(end), Some(start)) = (self.end(), next_path.start()) else {
                continue;
            };
            if is_close(&end, &start, Tolerance::VERTEX.linear) {
                self.vertices.extend_from_slice(&next_path.vertices[1..]);
            } else {
                self.commands.push(Command::MoveTo);
                self.vertices.extend_from_slice(&next_path.vertices);
            }
            self.commands.extend_from_slice(&next_path.commands);
        }
    }

    /// Concatenate `paths` into a new multi-path.
    pub fn concatenate(paths: &[Path2d]) -> Path2d {
        let mut result = Path2d::default();
        result.extend(paths);
        result
    }
}

/// Split all `paths` into single paths, empty paths are dropped.
pub fn single_paths(paths: &[Path2d]) -> Vec<Path2d> {
    paths.iter().flat_map(|p| p.sub_paths()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn multi_path() -> Path2d {
        let mut path = Path2d::new(p(0.0, 0.0));
        path.line_to(p(1.0, 0.0));
        path.move_to(p(5.0, 5.0));
        path.curve3_to(p(7.0, 5.0), p(6.0, 6.0));
        path
    }

    #[test]
    fn test_commands_decode_vertex_layout() {
        let path = multi_path();
        let elements: Vec<PathElement> = path.commands().collect();
        assert_eq!(
            elements,
            vec![
                PathElement::LineTo(p(1.0, 0.0)),
                PathElement::MoveTo(p(5.0, 5.0)),
                PathElement::Curve3To {
                    ctrl: p(6.0, 6.0),
                    end: p(7.0, 5.0)
                },
            ]
        );
    }

    #[test]
    fn test_sub_paths() {
        let path = multi_path();
        assert!(path.has_sub_paths());
        let parts = path.sub_paths();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].control_vertices(), &[p(0.0, 0.0), p(1.0, 0.0)]);
        assert_eq!(parts[1].start(), Some(p(5.0, 5.0)));
        assert_eq!(parts[1].command_codes(), &[Command::Curve3To]);
        assert!(Path2d::default().sub_paths().is_empty());
    }

    #[test]
    fn test_repeated_move_to_replaces_target() {
        let mut path = Path2d::new(p(0.0, 0.0));
        path.line_to(p(1.0, 0.0));
        path.move_to(p(2.0, 0.0));
        path.move_to(p(3.0, 0.0));
        assert_eq!(path.len(), 2);
        assert_eq!(path.end(), Some(p(3.0, 0.0)));
    }

    #[test]
    fn test_from_vertices_close() {
        let path = Path2d::from_vertices(vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)], true);
        assert!(path.is_closed());
        assert_eq!(path.len(), 3);
        assert!(Path2d::from_vertices(Vec::new(), true).is_empty());
    }

    #[test]
    fn test_orientation_of_multi_path_is_invalid() {
        let path = multi_path();
        assert!(matches!(
            path.has_clockwise_orientation(),
            Err(GeometryError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_reverse_and_orient() {
        let mut path = Path2d::from_vertices(vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0)], true);
        assert!(path.has_clockwise_orientation().unwrap());
        path.counter_clockwise().unwrap();
        assert!(!path.has_clockwise_orientation().unwrap());
        assert_eq!(path.start(), Some(p(0.0, 0.0)));
        assert_eq!(path.control_vertices()[1], p(1.0, 0.0));
    }

    #[test]
    fn test_flattening_lines_and_curves() {
        let path = multi_path();
        let points: Vec<Point2> = path.flattening(0.01, 4).collect();
        assert_eq!(points[0], p(0.0, 0.0));
        assert_eq!(points[1], p(1.0, 0.0));
        assert_eq!(points[2], p(5.0, 5.0));
        assert_eq!(*points.last().unwrap(), p(7.0, 5.0));
        assert!(points.len() >= 7);
        assert_eq!(Path2d::new(p(1.0, 1.0)).flattening(0.1, 4).count(), 0);
    }

    #[test]
    fn test_extend_joins_coincident_paths() {
        let a = Path2d::from_vertices(vec![p(0.0, 0.0), p(1.0, 0.0)], false);
        let b = Path2d::from_vertices(vec![p(1.0, 0.0), p(2.0, 0.0)], false);
        let c = Path2d::from_vertices(vec![p(5.0, 0.0), p(6.0, 0.0)], false);
        let joined = Path2d::concatenate(&[a, b, c]);
        assert_eq!(
            joined.command_codes(),
            &[Command::LineTo, Command::LineTo, Command::MoveTo, Command::LineTo]
        );
        assert_eq!(joined.sub_paths().len(), 2);
    }

    #[test]
    fn test_to_points2d() {
        let path = Path2d::from_vertices([p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)], false);
        let points = path.to_points2d(0.01, 4).unwrap();
        assert_eq!(points.vertices(), &[p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]);
        assert!(matches!(
            multi_path().to_points2d(0.01, 4),
            Err(GeometryError::InvalidGeometry(_))
        ));
        assert_eq!(path.reversed().start(), Some(p(1.0, 1.0)));
    }

    #[test]
    fn test_bbox_uses_control_vertices() {
        let mut path = Path2d::new(p(0.0, 0.0));
        path.curve4_to(p(4.0, 0.0), p(1.0, 3.0), p(3.0, 3.0));
        let bbox = path.bbox();
        assert_eq!(bbox.extmax, p(4.0, 3.0));
    }
}
