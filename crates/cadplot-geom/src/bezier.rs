//! Quadratic and cubic Bezier curves with adaptive flattening.
//!
//! Flattening starts from `segments` equal parameter steps and subdivides
//! a step while the distance between the chord midpoint and the curve
//! midpoint is at least `distance`. Vertices are produced on demand.

use cadplot_math::Point2;

/// Evaluates a curve at parameter `t` in `[0, 1]`.
pub trait CurvePoint {
    /// First control point, the curve start.
    fn start(&self) -> Point2;
    /// Last control point, the curve end.
    fn end(&self) -> Point2;
    /// Curve point at `t`.
    fn point(&self, t: f64) -> Point2;
}

/// Quadratic Bezier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bezier3P {
    /// Control points: start, control, end.
    pub points: [Point2; 3],
}

impl Bezier3P {
    /// Create from start, control point and end.
    pub fn new(start: Point2, ctrl: Point2, end: Point2) -> Self {
        Self {
            points: [start, ctrl, end],
        }
    }

    /// Adaptive flattening, yields the start point first.
    pub fn flattening(&self, distance: f64, segments: usize) -> Flattening<Self> {
        Flattening::new(*self, distance, segments)
    }

    /// Degree elevation to an equivalent cubic curve.
    pub fn to_cubic(&self) -> Bezier4P {
        let [s, c, e] = self.points;
        let ctrl1 = s + (c - s) * (2.0 / 3.0);
        let ctrl2 = e + (c - e) * (2.0 / 3.0);
        Bezier4P::new(s, ctrl1, ctrl2, e)
    }
}

impl CurvePoint for Bezier3P {
    fn start(&self) -> Point2 {
        self.points[0]
    }

    fn end(&self) -> Point2 {
        self.points[2]
    }

    fn point(&self, t: f64) -> Point2 {
        let [p0, p1, p2] = self.points;
        let u = 1.0 - t;
        let a = u * u;
        let b = 2.0 * t * u;
        let c = t * t;
        Point2::new(
            a * p0.x + b * p1.x + c * p2.x,
            a * p0.y + b * p1.y + c * p2.y,
        )
    }
}

/// Cubic Bezier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bezier4P {
    /// Control points: start, control 1, control 2, end.
    pub points: [Point2; 4],
}

impl Bezier4P {
    /// Create from start, both control points and end.
    pub fn new(start: Point2, ctrl1: Point2, ctrl2: Point2, end: Point2) -> Self {
        Self {
            points: [start, ctrl1, ctrl2, end],
        }
    }

    /// Adaptive flattening, yields the start point first.
    pub fn flattening(&self, distance: f64, segments: usize) -> Flattening<Self> {
        Flattening::new(*self, distance, segments)
    }
}

impl CurvePoint for Bezier4P {
    fn start(&self) -> Point2 {
        self.points[0]
    }

    fn end(&self) -> Point2 {
        self.points[3]
    }

    fn point(&self, t: f64) -> Point2 {
        // relative to p0, large offsets are added last
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        let b = 3.0 * u * u * t;
        let c = 3.0 * u * t * t;
        let d = t * t * t;
        let v = (p1 - p0) * b + (p2 - p0) * c + (p3 - p0) * d;
        p0 + v
    }
}

/// Lazy adaptive flattening iterator.
#[derive(Debug, Clone)]
pub struct Flattening<C> {
    curve: C,
    distance: f64,
    dt: f64,
    t0: f64,
    t1: f64,
    start_point: Point2,
    end_point: Point2,
    stack: Vec<(f64, Point2)>,
    state: FlatteningState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FlatteningState {
    Start,
    NextStep,
    Subdividing,
    Done,
}

impl<C: CurvePoint> Flattening<C> {
    fn new(curve: C, distance: f64, segments: usize) -> Self {
        let start_point = curve.start();
        Self {
            curve,
            distance,
            dt: 1.0 / segments.max(1) as f64,
            t0: 0.0,
            t1: 0.0,
            start_point,
            end_point: start_point,
            stack: Vec::new(),
            state: FlatteningState::Start,
        }
    }

    fn begin_step(&mut self) {
        self.t1 = self.t0 + self.dt;
        if (self.t1 - 1.0).abs() <= 1e-9 || self.t1 > 1.0 {
            self.end_point = self.curve.end();
            self.t1 = 1.0;
        } else {
            self.end_point = self.curve.point(self.t1);
        }
        self.state = FlatteningState::Subdividing;
    }
}

impl<C: CurvePoint> Iterator for Flattening<C> {
    type Item = Point2;

    fn next(&mut self) -> Option<Point2> {
        loop {
            match self.state {
                FlatteningState::Start => {
                    self.state = FlatteningState::NextStep;
                    return Some(self.start_point);
                }
                FlatteningState::NextStep => {
                    if self.t0 >= 1.0 {
                        self.state = FlatteningState::Done;
                        return None;
                    }
                    self.begin_step();
                }
                FlatteningState::Subdividing => {
                    let mid_t = (self.t0 + self.t1) * 0.5;
                    let mid_point = self.curve.point(mid_t);
                    let chk_point = midpoint(&self.start_point, &self.end_point);
                    if (chk_point - mid_point).norm() < self.distance {
                        let end_point = self.end_point;
                        self.t0 = self.t1;
                        self.start_point = end_point;
                        match self.stack.pop() {
                            Some((t1, end)) => {
                                self.t1 = t1;
                                self.end_point = end;
                            }
                            None => self.state = FlatteningState::NextStep,
                        }
                        return Some(end_point);
                    }
                    self.stack.push((self.t1, self.end_point));
                    self.t1 = mid_t;
                    self.end_point = mid_point;
                }
                FlatteningState::Done => return None,
            }
        }
    }
}

fn midpoint(a: &Point2, b: &Point2) -> Point2 {
    Point2::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}
