//! Circular arc reconstruction and flattening.
//!
//! Arcs are described in polar form about a center. Start and end radius may
//! differ slightly (files rarely place the center exactly), so the flattener
//! interpolates radius as well as angle.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::error::FabError;

use super::{Path, Point};

const QUADRANT_SLACK: f64 = 1e-9;
const POINT_EPSILON: f64 = 1e-12;
const MIN_STEP_ANGLE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

/// An arc in polar form. The angle delta carries the direction: positive is
/// counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarArc {
    pub center: Point,
    pub start: Point,
    pub end: Point,
    pub start_angle: f64,
    pub end_angle: f64,
    pub start_radius: f64,
    pub end_radius: f64,
}

impl PolarArc {
    /// Arc from `start` to `end` about `center`, sweeping in `direction`.
    /// Coincident start and end describe a full circle.
    pub fn new(start: Point, end: Point, center: Point, direction: ArcDirection) -> PolarArc {
        let start_angle = angle_of(start, center);
        let mut end_angle = angle_of(end, center);
        match direction {
            ArcDirection::CounterClockwise => {
                if end_angle <= start_angle {
                    end_angle += TAU;
                }
            }
            ArcDirection::Clockwise => {
                if end_angle >= start_angle {
                    end_angle -= TAU;
                }
            }
        }
        PolarArc {
            center,
            start,
            end,
            start_angle,
            end_angle,
            start_radius: distance(start, center),
            end_radius: distance(end, center),
        }
    }

    fn zero_length(point: Point, center: Point) -> PolarArc {
        let angle = angle_of(point, center);
        let radius = distance(point, center);
        PolarArc {
            center,
            start: point,
            end: point,
            start_angle: angle,
            end_angle: angle,
            start_radius: radius,
            end_radius: radius,
        }
    }

    /// Signed angle delta, radians.
    pub fn delta(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn sweep(&self) -> f64 {
        self.delta().abs()
    }

    pub fn is_single_quadrant(&self) -> bool {
        self.sweep() <= FRAC_PI_2 + QUADRANT_SLACK
    }

    pub fn max_radius(&self) -> f64 {
        self.start_radius.max(self.end_radius)
    }

    /// Polyline whose chords stay within `tolerance` of the true arc.
    ///
    /// Emits `ceil(sweep / step) + 1` vertices; the first and last are the
    /// commanded endpoints exactly.
    pub fn flatten(&self, tolerance: f64) -> Path {
        let delta = self.delta();
        let step = step_angle(self.max_radius(), tolerance);
        let segments = ((delta.abs() / step).ceil() as usize).max(1);

        let mut points = Vec::with_capacity(segments + 1);
        points.push(self.start);
        for k in 1..segments {
            let t = k as f64 / segments as f64;
            let angle = self.start_angle + t * delta;
            let radius = self.start_radius + t * (self.end_radius - self.start_radius);
            points.push([
                self.center[0] + radius * angle.cos(),
                self.center[1] + radius * angle.sin(),
            ]);
        }
        points.push(self.end);
        points
    }
}

/// Largest angular step whose chord deviates at most `tolerance` from a
/// circle of `radius`: `acos(2x² - 1)` with `x = 1 - tolerance / radius`.
pub fn step_angle(radius: f64, tolerance: f64) -> f64 {
    if !(radius > tolerance) {
        return PI;
    }
    let x = 1.0 - tolerance / radius;
    (2.0 * x * x - 1.0).min(1.0).acos().max(MIN_STEP_ANGLE)
}

/// Multi-quadrant arc: `center` is absolute.
pub fn resolve_multi_quadrant(
    start: Point,
    end: Point,
    center: Point,
    direction: ArcDirection,
) -> PolarArc {
    PolarArc::new(start, end, center, direction)
}

/// Single-quadrant arc: `offset` is the unsigned distance from `start` to the
/// center along each axis. Of the four signed candidates, those spanning at
/// most a quarter turn are kept and the one with the smallest larger radius
/// wins.
pub fn resolve_single_quadrant(
    start: Point,
    end: Point,
    offset: Point,
    direction: ArcDirection,
) -> Option<PolarArc> {
    let (i, j) = (offset[0].abs(), offset[1].abs());
    if same_point(start, end) {
        return Some(PolarArc::zero_length(start, [start[0] + i, start[1] + j]));
    }

    let mut best: Option<PolarArc> = None;
    for (sx, sy) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
        let center = [start[0] + sx * i, start[1] + sy * j];
        let arc = PolarArc::new(start, end, center, direction);
        if !arc.is_single_quadrant() {
            continue;
        }
        if best.map_or(true, |b| arc.max_radius() < b.max_radius()) {
            best = Some(arc);
        }
    }
    best
}

/// Center of the arc of `radius` through `start` and `end`. The center lies on
/// the chord's perpendicular bisector; a negative radius selects the major arc.
pub fn center_from_radius(
    start: Point,
    end: Point,
    radius: f64,
    direction: ArcDirection,
) -> Result<Point, FabError> {
    let (dx, dy) = (end[0] - start[0], end[1] - start[1]);
    let chord = dx.hypot(dy);
    if chord < POINT_EPSILON {
        return Err(FabError::Format(
            "arc radius given for coincident endpoints".into(),
        ));
    }
    let half = chord / 2.0;
    let r = radius.abs();
    if r + 1e-9 < half {
        return Err(FabError::Format(format!(
            "arc radius {r} too small for chord {chord}"
        )));
    }
    let height = (r * r - half * half).max(0.0).sqrt();
    let mut side = match direction {
        ArcDirection::CounterClockwise => 1.0,
        ArcDirection::Clockwise => -1.0,
    };
    if radius < 0.0 {
        side = -side;
    }
    // Left-hand normal of the chord.
    let (nx, ny) = (-dy / chord, dx / chord);
    Ok([
        start[0] + dx / 2.0 + side * height * nx,
        start[1] + dy / 2.0 + side * height * ny,
    ])
}

fn angle_of(p: Point, center: Point) -> f64 {
    (p[1] - center[1]).atan2(p[0] - center[0])
}

fn distance(a: Point, b: Point) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn same_point(a: Point, b: Point) -> bool {
    distance(a, b) < POINT_EPSILON
}
