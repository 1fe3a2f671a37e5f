//! Polygon boolean operations and stroke primitives.
//!
//! All inputs are filled with the non-zero rule. Results come back as flat
//! contour lists with outer boundaries counter-clockwise and holes clockwise.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

use crate::options::ParseOptions;

use super::arc::step_angle;
use super::{signed_area, Path, Paths, Point};

/// Contours with less area than this are dropped after simplification.
const MIN_CONTOUR_AREA: f64 = 1e-12;

fn overlay(subject: &Paths, clip: &Paths, rule: OverlayRule) -> Paths {
    let shapes: Vec<Vec<Vec<[f64; 2]>>> = subject.overlay(clip, rule, FillRule::NonZero);
    shapes
        .into_iter()
        .flatten()
        .filter(|contour| contour.len() >= 3)
        .collect()
}

pub fn union(a: &Paths, b: &Paths) -> Paths {
    if b.is_empty() {
        return simplify(a);
    }
    if a.is_empty() {
        return simplify(b);
    }
    overlay(a, b, OverlayRule::Union)
}

pub fn difference(a: &Paths, b: &Paths) -> Paths {
    if a.is_empty() {
        return Vec::new();
    }
    if b.is_empty() {
        return simplify(a);
    }
    overlay(a, b, OverlayRule::Difference)
}

pub fn intersection(a: &Paths, b: &Paths) -> Paths {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    overlay(a, b, OverlayRule::Intersect)
}

/// Resolve self-overlaps and normalize orientation.
pub fn simplify(paths: &Paths) -> Paths {
    if paths.is_empty() {
        return Vec::new();
    }
    let empty: Paths = Vec::new();
    overlay(paths, &empty, OverlayRule::Subject)
        .into_iter()
        .filter(|contour| signed_area(contour).abs() > MIN_CONTOUR_AREA)
        .collect()
}

/// Union of many polygon sets, merged pairwise so each boolean operation
/// sees inputs of similar size.
pub fn union_all(mut sets: Vec<Paths>) -> Paths {
    sets.retain(|set| !set.is_empty());
    if sets.is_empty() {
        return Vec::new();
    }
    while sets.len() > 1 {
        let mut merged = Vec::with_capacity(sets.len().div_ceil(2));
        let mut pairs = sets.into_iter();
        while let Some(a) = pairs.next() {
            match pairs.next() {
                Some(b) => merged.push(union(&a, &b)),
                None => merged.push(a),
            }
        }
        sets = merged;
    }
    let last = sets.pop().unwrap_or_default();
    simplify(&last)
}

/// Vertex count for a full circle of `radius`.
pub fn circle_segments(radius: f64, opts: &ParseOptions) -> usize {
    let step = step_angle(radius, opts.arc_tolerance);
    let needed = (TAU / step).ceil() as usize;
    needed.max(opts.min_circle_segments).max(3)
}

/// Counter-clockwise polygon approximating a circle.
pub fn circle(center: Point, radius: f64, opts: &ParseOptions) -> Path {
    if !(radius > 0.0) {
        return Vec::new();
    }
    let n = circle_segments(radius, opts);
    (0..n)
        .map(|k| {
            let angle = TAU * k as f64 / n as f64;
            [
                center[0] + radius * angle.cos(),
                center[1] + radius * angle.sin(),
            ]
        })
        .collect()
}

/// Stadium shape: every point within `width / 2` of the segment `a`–`b`.
pub fn capsule(a: Point, b: Point, width: f64, opts: &ParseOptions) -> Path {
    let radius = width / 2.0;
    if !(radius > 0.0) {
        return Vec::new();
    }
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    if dx.hypot(dy) < 1e-12 {
        return circle(a, radius, opts);
    }
    let heading = dy.atan2(dx);
    let half = circle_segments(radius, opts).div_ceil(2);

    let mut path = Vec::with_capacity(2 * (half + 1));
    for (center, from) in [(b, heading - FRAC_PI_2), (a, heading + FRAC_PI_2)] {
        for k in 0..=half {
            let angle = from + PI * k as f64 / half as f64;
            path.push([
                center[0] + radius * angle.cos(),
                center[1] + radius * angle.sin(),
            ]);
        }
    }
    path
}

/// Outline of a round-capped, round-joined stroke along `points`.
pub fn buffer_polyline(points: &[Point], width: f64, opts: &ParseOptions) -> Paths {
    if !(width > 0.0) {
        return Vec::new();
    }
    let mut vertices: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        let duplicate = vertices
            .last()
            .is_some_and(|q: &Point| (q[0] - p[0]).hypot(q[1] - p[1]) < 1e-12);
        if !duplicate {
            vertices.push(p);
        }
    }

    match vertices.as_slice() {
        [] => Vec::new(),
        [p] => vec![circle(*p, width / 2.0, opts)],
        [a, b] => vec![capsule(*a, *b, width, opts)],
        _ => union_all(
            vertices
                .windows(2)
                .map(|w| vec![capsule(w[0], w[1], width, opts)])
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::net_area;

    fn square(x: f64, y: f64, size: f64) -> Path {
        vec![[x, y], [x + size, y], [x + size, y + size], [x, y + size]]
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let out = union(&vec![square(0.0, 0.0, 2.0)], &vec![square(1.0, 1.0, 2.0)]);
        assert!((net_area(&out).abs() - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_difference_leaves_hole() {
        let out = difference(&vec![square(0.0, 0.0, 4.0)], &vec![square(1.0, 1.0, 2.0)]);
        assert_eq!(out.len(), 2);
        assert!((net_area(&out).abs() - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_intersection() {
        let out = intersection(&vec![square(0.0, 0.0, 2.0)], &vec![square(1.0, 1.0, 2.0)]);
        assert!((net_area(&out).abs() - 1.0).abs() < 1e-6);
        assert!(intersection(&vec![square(0.0, 0.0, 1.0)], &Vec::new()).is_empty());
    }

    #[test]
    fn test_union_all_disjoint_and_overlapping() {
        let sets = vec![
            vec![square(0.0, 0.0, 1.0)],
            vec![square(5.0, 0.0, 1.0)],
            vec![square(0.5, 0.0, 1.0)],
            Vec::new(),
        ];
        let out = union_all(sets);
        assert!((net_area(&out).abs() - 2.5).abs() < 1e-6);
        assert!(union_all(Vec::new()).is_empty());
    }

    #[test]
    fn test_circle_respects_tolerance_and_minimum() {
        let opts = ParseOptions::default();
        let c = circle([0.0, 0.0], 1.0, &opts);
        assert!(c.len() >= opts.min_circle_segments);
        assert!(signed_area(&c) > 0.0);
        let sagitta = 1.0 - (PI / c.len() as f64).cos();
        assert!(sagitta <= opts.arc_tolerance + 1e-12);

        let tiny = circle([0.0, 0.0], 0.0005, &opts);
        assert_eq!(tiny.len(), opts.min_circle_segments);
        assert!(circle([0.0, 0.0], 0.0, &opts).is_empty());
    }

    #[test]
    fn test_capsule_area() {
        let opts = ParseOptions {
            arc_tolerance: 0.0001,
            ..ParseOptions::default()
        };
        let c = capsule([0.0, 0.0], [10.0, 0.0], 2.0, &opts);
        assert!(signed_area(&c) > 0.0);
        let expected = 10.0 * 2.0 + PI;
        assert!((signed_area(&c) - expected).abs() < 0.01);
    }

    #[test]
    fn test_buffer_polyline_cases() {
        let opts = ParseOptions::default();
        assert!(buffer_polyline(&[], 1.0, &opts).is_empty());
        assert!(buffer_polyline(&[[0.0, 0.0]], 0.0, &opts).is_empty());

        let dot = buffer_polyline(&[[0.0, 0.0], [0.0, 0.0]], 1.0, &opts);
        assert_eq!(dot.len(), 1);
        assert!((signed_area(&dot[0]) - PI * 0.25).abs() < 0.01);

        // L-shaped stroke: two overlapping arms, two end caps, a rounded
        // outer corner.
        let l = buffer_polyline(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]], 1.0, &opts);
        let area = net_area(&l).abs();
        let expected = 19.75 + PI * 0.25 + PI / 16.0;
        assert!((area - expected).abs() < 0.05, "area {area}");
    }
}
