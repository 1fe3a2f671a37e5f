pub mod arc;
pub mod kernel;

/// A point in millimeters.
pub type Point = [f64; 2];
/// An implicitly closed contour.
pub type Path = Vec<Point>;
/// A multi-contour polygon set, filled with the non-zero rule.
pub type Paths = Vec<Path>;

/// Whether drawn geometry adds material (dark) or removes it (clear).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Polarity {
    #[default]
    Dark,
    Clear,
}

impl Polarity {
    pub fn inverted(self) -> Polarity {
        match self {
            Polarity::Dark => Polarity::Clear,
            Polarity::Clear => Polarity::Dark,
        }
    }
}

/// Shoelace area; positive for counter-clockwise contours.
pub fn signed_area(path: &[Point]) -> f64 {
    if path.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (k, a) in path.iter().enumerate() {
        let b = path[(k + 1) % path.len()];
        twice += a[0] * b[1] - b[0] * a[1];
    }
    twice / 2.0
}

/// Sum of signed contour areas. Outer contours and holes cancel as expected
/// for normalized kernel output.
pub fn net_area(paths: &[Path]) -> f64 {
    paths.iter().map(|p| signed_area(p)).sum()
}

pub fn reverse_paths(paths: &mut Paths) {
    for path in paths.iter_mut() {
        path.reverse();
    }
}

/// Axis-aligned bounds as `(min, max)`, or `None` for empty geometry.
pub fn bounds(paths: &[Path]) -> Option<(Point, Point)> {
    let mut points = paths.iter().flatten();
    let first = *points.next()?;
    Some(points.fold((first, first), |(lo, hi), p| {
        (
            [lo[0].min(p[0]), lo[1].min(p[1])],
            [hi[0].max(p[0]), hi[1].max(p[1])],
        )
    }))
}

/// Scale (with optional mirroring), then rotate, then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    /// Negate X before rotating.
    pub mirror_x: bool,
    /// Negate Y before rotating.
    pub mirror_y: bool,
    /// Counter-clockwise, radians.
    pub rotation: f64,
    pub offset: Point,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            mirror_x: false,
            mirror_y: false,
            rotation: 0.0,
            offset: [0.0, 0.0],
        }
    }
}

impl Transform {
    pub fn translate(offset: Point) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// An odd number of reflections turns counter-clockwise contours clockwise.
    pub fn flips_winding(&self) -> bool {
        self.mirror_x != self.mirror_y
    }

    pub fn apply(&self, p: Point) -> Point {
        let sx = if self.mirror_x { -self.scale } else { self.scale };
        let sy = if self.mirror_y { -self.scale } else { self.scale };
        let (x, y) = (p[0] * sx, p[1] * sy);
        let (x, y) = if self.rotation == 0.0 {
            (x, y)
        } else {
            let (sin, cos) = self.rotation.sin_cos();
            (x * cos - y * sin, x * sin + y * cos)
        };
        [x + self.offset[0], y + self.offset[1]]
    }

    pub fn apply_paths(&self, paths: &[Path]) -> Paths {
        let flip = self.flips_winding();
        paths
            .iter()
            .map(|path| {
                let mut out: Path = path.iter().map(|&p| self.apply(p)).collect();
                if flip {
                    out.reverse();
                }
                out
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn unit_square() -> Path {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
    }

    #[test]
    fn test_signed_area_orientation() {
        let mut square = unit_square();
        assert_abs_diff_eq!(signed_area(&square), 1.0, epsilon = 1e-12);
        square.reverse();
        assert_abs_diff_eq!(signed_area(&square), -1.0, epsilon = 1e-12);
        assert_eq!(signed_area(&square[..2]), 0.0);
    }

    #[test]
    fn test_transform_order_scale_rotate_translate() {
        let t = Transform {
            scale: 2.0,
            rotation: FRAC_PI_2,
            offset: [10.0, 0.0],
            ..Transform::default()
        };
        // (1, 0) → scale (2, 0) → rotate (0, 2) → translate (10, 2)
        let p = t.apply([1.0, 0.0]);
        assert_abs_diff_eq!(p[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_mirror_preserves_winding() {
        let t = Transform {
            mirror_x: true,
            ..Transform::default()
        };
        let out = t.apply_paths(&[unit_square()]);
        assert!(signed_area(&out[0]) > 0.0);
        assert_eq!(out[0].last(), Some(&[0.0, 0.0]));

        let both = Transform {
            mirror_x: true,
            mirror_y: true,
            ..Transform::default()
        };
        assert!(!both.flips_winding());
        assert!(signed_area(&both.apply_paths(&[unit_square()])[0]) > 0.0);
    }

    #[test]
    fn test_bounds() {
        assert!(bounds(&[]).is_none());
        let (lo, hi) = bounds(&[unit_square(), vec![[-1.0, 3.0]]]).unwrap();
        assert_eq!(lo, [-1.0, 0.0]);
        assert_eq!(hi, [1.0, 3.0]);
    }
}
