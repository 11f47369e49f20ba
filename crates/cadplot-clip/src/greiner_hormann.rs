//! Greiner-Hormann boolean operations on arbitrary polygons.
//!
//! Based on "Efficient Clipping of Arbitrary Polygons" by Günther Greiner
//! and Kai Hormann, ACM Transactions on Graphics 1998;17(2):71-83.
//!
//! Both polygons are stored as doubly linked rings inside an arena; links
//! are indices. Polygon end points lying exactly on an edge of the other
//! polygon are not intersections, so the algorithm only handles polygons
//! with real crossings.

use cadplot_math::{is_close, is_point_in_polygon_2d, Point2, PolygonRelation};

use crate::TOLERANCE;

/// Boolean operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperation {
    /// `p1 | p2`
    Union,
    /// `p1 - p2`
    Difference,
    /// `p1 & p2`
    Intersection,
}

/// Returns the intersection `p1 & p2`.
pub fn intersection(p1: &[Point2], p2: &[Point2]) -> Vec<Vec<Point2>> {
    greiner_hormann(p1, p2, BooleanOperation::Intersection)
}

/// Returns the difference `p1 - p2`.
pub fn difference(p1: &[Point2], p2: &[Point2]) -> Vec<Vec<Point2>> {
    greiner_hormann(p1, p2, BooleanOperation::Difference)
}

/// Returns the union `p1 | p2`.
pub fn union(p1: &[Point2], p2: &[Point2]) -> Vec<Vec<Point2>> {
    greiner_hormann(p1, p2, BooleanOperation::Union)
}

/// Run a boolean operation; the result polygons are closed.
pub fn greiner_hormann(p1: &[Point2], p2: &[Point2], op: BooleanOperation) -> Vec<Vec<Point2>> {
    let (s_entry, c_entry) = match op {
        BooleanOperation::Union => (false, false),
        BooleanOperation::Difference => (false, true),
        BooleanOperation::Intersection => (true, true),
    };
    clip(
        [GhPolygon::from_points(p1), GhPolygon::from_points(p2)],
        s_entry,
        c_entry,
    )
}

#[derive(Debug, Clone)]
struct Node {
    vtx: Point2,
    next: usize,
    prev: usize,
    neighbor: Option<usize>,
    entry: bool,
    alpha: f64,
    intersect: bool,
    checked: bool,
}

impl Node {
    fn new(vtx: Point2, alpha: f64, intersect: bool, index: usize) -> Self {
        Self {
            vtx,
            next: index,
            prev: index,
            neighbor: None,
            entry: !intersect,
            alpha,
            intersect,
            checked: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GhPolygon {
    nodes: Vec<Node>,
}

impl GhPolygon {
    const FIRST: usize = 0;

    fn from_points(points: &[Point2]) -> Self {
        let mut polygon = Self::default();
        for p in points {
            polygon.add(*p);
        }
        polygon
    }

    /// Append a vertex node as the last node of the ring.
    fn add(&mut self, vtx: Point2) {
        let index = self.nodes.len();
        self.nodes.push(Node::new(vtx, 0.0, false, index));
        if index > 0 {
            let last = self.nodes[Self::FIRST].prev;
            self.nodes[Self::FIRST].prev = index;
            self.nodes[index].next = Self::FIRST;
            self.nodes[index].prev = last;
            self.nodes[last].next = index;
        }
    }

    fn push_intersection(&mut self, vtx: Point2, alpha: f64) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node::new(vtx, alpha, true, index));
        index
    }

    /// Insert intersection `vertex` between the vertex nodes `start` and
    /// `end`, sorted by alpha.
    fn insert(&mut self, vertex: usize, start: usize, end: usize) {
        let alpha = self.nodes[vertex].alpha;
        let mut curr = start;
        while curr != end && self.nodes[curr].alpha < alpha {
            curr = self.nodes[curr].next;
        }
        let prev = self.nodes[curr].prev;
        self.nodes[vertex].next = curr;
        self.nodes[vertex].prev = prev;
        self.nodes[prev].next = vertex;
        self.nodes[curr].prev = vertex;
    }

    fn next_vertex_node(&self, mut index: usize) -> usize {
        while self.nodes[index].intersect {
            index = self.nodes[index].next;
        }
        index
    }

    /// Node indices in ring order starting at the first node.
    fn ring(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return indices;
        }
        let mut s = Self::FIRST;
        loop {
            indices.push(s);
            s = self.nodes[s].next;
            if s == Self::FIRST {
                return indices;
            }
        }
    }

    fn first_unchecked_intersect(&self) -> Option<usize> {
        self.ring()
            .into_iter()
            .find(|&i| self.nodes[i].intersect && !self.nodes[i].checked)
    }

    /// Closed vertex list in ring order.
    fn points(&self) -> Vec<Point2> {
        let mut points: Vec<Point2> = self.ring().into_iter().map(|i| self.nodes[i].vtx).collect();
        if let (Some(first), Some(last)) = (points.first().copied(), points.last()) {
            if !is_close(&first, last, TOLERANCE) {
                points.push(first);
            }
        }
        points
    }

    fn is_inside(&self, vertex: &Point2) -> bool {
        // boundary points count as inside
        is_point_in_polygon_2d(vertex, &self.points(), TOLERANCE) != PolygonRelation::Outside
    }
}

/// Intersection of two segments excluding the segment end points.
/// Returns the intersection point and the relative positions on both segments.
fn line_intersection(s1: Point2, s2: Point2, c1: Point2, c2: Point2) -> Option<(Point2, f64, f64)> {
    let tol = TOLERANCE;
    let den = (c2.y - c1.y) * (s2.x - s1.x) - (c2.x - c1.x) * (s2.y - s1.y);
    if den.abs() < tol {
        return None;
    }
    let us = ((c2.x - c1.x) * (s1.y - c1.y) - (c2.y - c1.y) * (s1.x - c1.x)) / den;
    let (lwr, upr) = (tol, 1.0 - tol);
    if !(lwr < us && us < upr) {
        return None;
    }
    let uc = ((s2.x - s1.x) * (s1.y - c1.y) - (s2.y - s1.y) * (s1.x - c1.x)) / den;
    if lwr < uc && uc < upr {
        let ip = Point2::new(s1.x + us * (s2.x - s1.x), s1.y + us * (s2.y - s1.y));
        return Some((ip, us, uc));
    }
    None
}

/// Clip `polygons[0]` (subject) with `polygons[1]` (clipper).
fn clip(mut polygons: [GhPolygon; 2], mut s_entry: bool, mut c_entry: bool) -> Vec<Vec<Point2>> {
    if polygons[0].nodes.is_empty() || polygons[1].nodes.is_empty() {
        return Vec::new();
    }
    let [subject, clipper] = &mut polygons;

    // phase 1: find intersections
    for s in subject.ring() {
        if subject.nodes[s].intersect {
            continue;
        }
        let mut c = GhPolygon::FIRST;
        loop {
            if !clipper.nodes[c].intersect {
                let s_next = subject.next_vertex_node(subject.nodes[s].next);
                let c_next = clipper.next_vertex_node(clipper.nodes[c].next);
                let hit = line_intersection(
                    subject.nodes[s].vtx,
                    subject.nodes[s_next].vtx,
                    clipper.nodes[c].vtx,
                    clipper.nodes[c_next].vtx,
                );
                if let Some((ip, us, uc)) = hit {
                    let subject_node = subject.push_intersection(ip, us);
                    let clipper_node = clipper.push_intersection(ip, uc);
                    subject.nodes[subject_node].neighbor = Some(clipper_node);
                    clipper.nodes[clipper_node].neighbor = Some(subject_node);
                    subject.insert(subject_node, s, s_next);
                    clipper.insert(clipper_node, c, c_next);
                }
            }
            c = clipper.nodes[c].next;
            if c == GhPolygon::FIRST {
                break;
            }
        }
    }

    // phase 2: identify entry and exit points
    s_entry ^= clipper.is_inside(&subject.nodes[GhPolygon::FIRST].vtx);
    for s in subject.ring() {
        if subject.nodes[s].intersect {
            subject.nodes[s].entry = s_entry;
            s_entry = !s_entry;
        }
    }
    c_entry ^= subject.is_inside(&clipper.nodes[GhPolygon::FIRST].vtx);
    for c in clipper.ring() {
        if clipper.nodes[c].intersect {
            clipper.nodes[c].entry = c_entry;
            c_entry = !c_entry;
        }
    }

    // phase 3: build the clipped polygons
    let mut result = Vec::new();
    while let Some(start) = polygons[0].first_unchecked_intersect() {
        let mut side = 0;
        let mut current = start;
        let mut clipped = vec![polygons[side].nodes[current].vtx];
        loop {
            set_checked(&mut polygons, side, current);
            let polygon = &polygons[side];
            loop {
                current = if polygon.nodes[current].entry {
                    polygon.nodes[current].next
                } else {
                    polygon.nodes[current].prev
                };
                clipped.push(polygon.nodes[current].vtx);
                if polygon.nodes[current].intersect {
                    break;
                }
            }
            match polygon.nodes[current].neighbor {
                Some(neighbor) => {
                    current = neighbor;
                    side = 1 - side;
                }
                None => break,
            }
            if polygons[side].nodes[current].checked {
                break;
            }
        }
        result.push(clipped);
    }
    result
}

fn set_checked(polygons: &mut [GhPolygon; 2], side: usize, index: usize) {
    let node = &mut polygons[side].nodes[index];
    node.checked = true;
    if let Some(neighbor) = node.neighbor {
        polygons[1 - side].nodes[neighbor].checked = true;
    }
}
