//! Aperture geometry with polarity-aware accumulation.
//!
//! An aperture keeps two polygon stores: `additive` (material it deposits)
//! and `clear` (material it removes when composed onto something else).
//! Draw calls queue geometry in a pending buffer; a change of polarity or an
//! explicit [`Aperture::commit`] folds the buffer into both stores so they
//! stay disjoint.

use std::f64::consts::TAU;

use log::debug;

use crate::error::FabError;
use crate::geometry::kernel::{self, capsule, circle};
use crate::geometry::{Path, Paths, Polarity, Transform};
use crate::options::ParseOptions;

/// What an aperture was defined as. Synthesis differs per kind; accumulation
/// does not.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Circle {
        diameter: f64,
    },
    Rectangle {
        width: f64,
        height: f64,
    },
    Obround {
        width: f64,
        height: f64,
    },
    Polygon {
        diameter: f64,
        vertices: u32,
        /// Degrees.
        rotation: f64,
    },
    Macro {
        name: String,
    },
    /// Block aperture, or the layer image itself.
    Block,
}

#[derive(Debug, Clone)]
pub struct Aperture {
    kind: ShapeKind,
    hole: Option<f64>,
    additive: Paths,
    clear: Paths,
    pending: Vec<Paths>,
    pending_polarity: Polarity,
    dirty: bool,
}

impl Aperture {
    /// Empty aperture of `kind`; geometry is drawn into it afterwards.
    pub fn new(kind: ShapeKind) -> Aperture {
        Aperture {
            kind,
            hole: None,
            additive: Vec::new(),
            clear: Vec::new(),
            pending: Vec::new(),
            pending_polarity: Polarity::Dark,
            dirty: false,
        }
    }

    pub fn block() -> Aperture {
        Aperture::new(ShapeKind::Block)
    }

    /// Standard aperture with its outline synthesized and an optional round
    /// hole cleared from the middle.
    pub fn standard(
        kind: ShapeKind,
        hole: Option<f64>,
        opts: &ParseOptions,
    ) -> Result<Aperture, FabError> {
        let outline = match &kind {
            ShapeKind::Circle { diameter } => {
                check_size("circle diameter", *diameter)?;
                circle_shape(*diameter, opts)
            }
            ShapeKind::Rectangle { width, height } => {
                check_size("rectangle width", *width)?;
                check_size("rectangle height", *height)?;
                rectangle_shape(*width, *height)
            }
            ShapeKind::Obround { width, height } => {
                check_size("obround width", *width)?;
                check_size("obround height", *height)?;
                obround_shape(*width, *height, opts)
            }
            ShapeKind::Polygon {
                diameter,
                vertices,
                rotation,
            } => {
                check_size("polygon diameter", *diameter)?;
                if !(3..=12).contains(vertices) {
                    return Err(FabError::Format(format!(
                        "polygon aperture needs 3 to 12 vertices, got {vertices}"
                    )));
                }
                polygon_shape(*diameter, *vertices, rotation.to_radians())
            }
            ShapeKind::Macro { .. } | ShapeKind::Block => {
                return Err(FabError::Format(format!(
                    "{kind:?} has no standard outline"
                )))
            }
        };

        if let Some(hole) = hole {
            check_size("hole diameter", hole)?;
        }
        let mut aperture = Aperture::new(kind);
        aperture.hole = hole;
        aperture.draw_paths(outline, Polarity::Dark);
        if let Some(hole) = hole {
            aperture.draw_paths(circle_shape(hole, opts), Polarity::Clear);
        }
        aperture.commit();
        Ok(aperture)
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    pub fn hole(&self) -> Option<f64> {
        self.hole
    }

    /// Diameter of a plain round aperture. Anything with a hole, any other
    /// outline, and anything built by a macro reports `None`.
    pub fn is_simple_circle(&self) -> Option<f64> {
        match (&self.kind, self.hole) {
            (ShapeKind::Circle { diameter }, None) => Some(*diameter),
            _ => None,
        }
    }

    /// Queue `paths` with `polarity`, committing first if the polarity of the
    /// pending buffer differs.
    pub fn draw_paths(&mut self, paths: Paths, polarity: Polarity) {
        let paths: Paths = paths.into_iter().filter(|p| p.len() >= 3).collect();
        if paths.is_empty() {
            return;
        }
        if polarity != self.pending_polarity && !self.pending.is_empty() {
            self.commit();
        }
        self.pending_polarity = polarity;
        self.pending.push(paths);
    }

    pub fn draw_paths_transformed(
        &mut self,
        paths: &[Path],
        polarity: Polarity,
        transform: &Transform,
    ) {
        self.draw_paths(transform.apply_paths(paths), polarity);
    }

    /// Compose `other` into this aperture: its additive geometry with
    /// `polarity`, its clear geometry with the opposite polarity.
    pub fn draw_aperture(&mut self, other: &mut Aperture, polarity: Polarity, transform: &Transform) {
        let additive = transform.apply_paths(other.additive());
        let clear = transform.apply_paths(other.clear());
        self.draw_paths(additive, polarity);
        self.draw_paths(clear, polarity.inverted());
    }

    /// Fold the pending buffer into the additive and clear stores.
    pub fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = kernel::union_all(std::mem::take(&mut self.pending));
        debug!(
            "commit {} contour(s) {:?} into {:?}",
            batch.len(),
            self.pending_polarity,
            self.kind
        );
        match self.pending_polarity {
            Polarity::Dark => {
                self.additive = kernel::union(&self.additive, &batch);
                self.clear = kernel::difference(&self.clear, &batch);
            }
            Polarity::Clear => {
                self.additive = kernel::difference(&self.additive, &batch);
                self.clear = kernel::union(&self.clear, &batch);
            }
        }
        self.dirty = true;
    }

    fn simplify(&mut self) {
        self.commit();
        if self.dirty {
            self.additive = kernel::simplify(&self.additive);
            self.clear = kernel::simplify(&self.clear);
            self.dirty = false;
        }
    }

    pub fn additive(&mut self) -> &Paths {
        self.simplify();
        &self.additive
    }

    pub fn clear(&mut self) -> &Paths {
        self.simplify();
        &self.clear
    }

    /// Take the finished additive geometry.
    pub fn into_additive(mut self) -> Paths {
        self.simplify();
        self.additive
    }
}

fn check_size(what: &str, value: f64) -> Result<(), FabError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FabError::Format(format!("{what} must be non-negative, got {value}")))
    }
}

pub fn circle_shape(diameter: f64, opts: &ParseOptions) -> Paths {
    vec![circle([0.0, 0.0], diameter / 2.0, opts)]
}

pub fn rectangle_shape(width: f64, height: f64) -> Paths {
    let (w, h) = (width / 2.0, height / 2.0);
    vec![vec![[-w, -h], [w, -h], [w, h], [-w, h]]]
}

/// Stadium fitting a `width` x `height` box, rounded on the shorter axis.
pub fn obround_shape(width: f64, height: f64, opts: &ParseOptions) -> Paths {
    let path = if width > height {
        let reach = (width - height) / 2.0;
        capsule([-reach, 0.0], [reach, 0.0], height, opts)
    } else {
        let reach = (height - width) / 2.0;
        capsule([0.0, -reach], [0.0, reach], width, opts)
    };
    vec![path]
}

/// Regular polygon on the circumscribed `diameter`, first vertex at
/// `rotation` radians.
pub fn polygon_shape(diameter: f64, vertices: u32, rotation: f64) -> Paths {
    let r = diameter / 2.0;
    let path = (0..vertices)
        .map(|k| {
            let angle = rotation + TAU * k as f64 / vertices as f64;
            [r * angle.cos(), r * angle.sin()]
        })
        .collect();
    vec![path]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{net_area, signed_area};
    use std::f64::consts::PI;

    fn opts() -> ParseOptions {
        ParseOptions::default()
    }

    fn square(x: f64, y: f64, size: f64) -> Paths {
        vec![vec![[x, y], [x + size, y], [x + size, y + size], [x, y + size]]]
    }

    #[test]
    fn test_simple_circle() {
        let ap = Aperture::standard(ShapeKind::Circle { diameter: 2.0 }, None, &opts()).unwrap();
        assert_eq!(ap.is_simple_circle(), Some(2.0));
    }

    #[test]
    fn test_hole_disqualifies_simple_circle() {
        let mut ap =
            Aperture::standard(ShapeKind::Circle { diameter: 2.0 }, Some(1.0), &opts()).unwrap();
        assert_eq!(ap.is_simple_circle(), None);
        let area = net_area(ap.additive()).abs();
        assert!((area - (PI - PI * 0.25)).abs() < 0.01, "area {area}");
        let hole = net_area(ap.clear()).abs();
        assert!((hole - PI * 0.25).abs() < 0.01, "hole {hole}");
    }

    #[test]
    fn test_macro_circle_is_not_simple() {
        let mut ap = Aperture::new(ShapeKind::Macro { name: "DOT".into() });
        ap.draw_paths(circle_shape(2.0, &opts()), Polarity::Dark);
        assert_eq!(ap.is_simple_circle(), None);
        assert!(net_area(ap.additive()) > 3.0);
    }

    #[test]
    fn test_dark_clear_dark_restores() {
        let p = square(0.0, 0.0, 1.0);
        let mut ap = Aperture::block();
        ap.draw_paths(p.clone(), Polarity::Dark);
        ap.draw_paths(p.clone(), Polarity::Clear);
        ap.draw_paths(p, Polarity::Dark);
        assert_eq!(ap.pending.len(), 1);
        assert!((net_area(ap.additive()).abs() - 1.0).abs() < 1e-6);
        assert!(ap.clear().is_empty());
    }

    #[test]
    fn test_polarity_change_alone_commits() {
        let mut ap = Aperture::block();
        ap.draw_paths(square(0.0, 0.0, 2.0), Polarity::Dark);
        ap.draw_paths(square(0.0, 0.0, 1.0), Polarity::Clear);
        assert_eq!(ap.pending.len(), 1);
        assert_eq!(ap.pending_polarity, Polarity::Clear);
        assert!((net_area(&ap.additive).abs() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_same_polarity_batches_until_commit() {
        let mut ap = Aperture::block();
        ap.draw_paths(square(0.0, 0.0, 1.0), Polarity::Dark);
        ap.draw_paths(square(0.5, 0.0, 1.0), Polarity::Dark);
        assert_eq!(ap.pending.len(), 2);
        assert!((net_area(ap.additive()).abs() - 1.5).abs() < 1e-6);
        assert!(ap.pending.is_empty());
    }

    #[test]
    fn test_standard_shapes() {
        let mut rect = Aperture::standard(
            ShapeKind::Rectangle {
                width: 2.0,
                height: 1.0,
            },
            None,
            &opts(),
        )
        .unwrap();
        assert!((net_area(rect.additive()).abs() - 2.0).abs() < 1e-6);

        let mut obround = Aperture::standard(
            ShapeKind::Obround {
                width: 1.0,
                height: 3.0,
            },
            None,
            &opts(),
        )
        .unwrap();
        let expected = 2.0 * 1.0 + PI * 0.25;
        assert!((net_area(obround.additive()).abs() - expected).abs() < 0.01);

        let hexagon = polygon_shape(2.0, 6, 0.0);
        assert_eq!(hexagon[0].len(), 6);
        assert!((hexagon[0][0][0] - 1.0).abs() < 1e-12);
        assert!(signed_area(&hexagon[0]) > 0.0);
    }

    #[test]
    fn test_invalid_standard_shapes() {
        let bad_polygon = ShapeKind::Polygon {
            diameter: 1.0,
            vertices: 13,
            rotation: 0.0,
        };
        assert!(matches!(
            Aperture::standard(bad_polygon, None, &opts()),
            Err(FabError::Format(_))
        ));
        assert!(Aperture::standard(ShapeKind::Circle { diameter: -1.0 }, None, &opts()).is_err());
        assert!(Aperture::standard(ShapeKind::Block, None, &opts()).is_err());
    }

    #[test]
    fn test_draw_aperture_composes_clear_geometry() {
        // Clearing with a donut removes the ring and keeps the material
        // under its hole.
        let mut donut =
            Aperture::standard(ShapeKind::Circle { diameter: 2.0 }, Some(1.0), &opts()).unwrap();
        let mut layer = Aperture::block();
        layer.draw_paths(square(-5.0, -5.0, 10.0), Polarity::Dark);
        layer.draw_aperture(&mut donut, Polarity::Clear, &Transform::translate([0.0, 0.0]));
        let area = net_area(layer.additive()).abs();
        let expected = 100.0 - (PI - PI * 0.25);
        assert!((area - expected).abs() < 0.02, "area {area}");
    }

    #[test]
    fn test_dark_flash_of_holed_aperture_clears_beneath_hole() {
        let mut donut =
            Aperture::standard(ShapeKind::Circle { diameter: 2.0 }, Some(1.0), &opts()).unwrap();
        let mut layer = Aperture::block();
        layer.draw_paths(square(-5.0, -5.0, 10.0), Polarity::Dark);
        layer.draw_aperture(&mut donut, Polarity::Dark, &Transform::translate([0.0, 0.0]));
        let area = net_area(layer.additive()).abs();
        assert!((area - (100.0 - PI * 0.25)).abs() < 0.02, "area {area}");
        assert_eq!(layer.additive().len(), 2);
    }

    #[test]
    fn test_mirrored_draw_keeps_positive_area() {
        let mut ap = Aperture::block();
        let t = Transform {
            mirror_y: true,
            offset: [3.0, 3.0],
            ..Transform::default()
        };
        ap.draw_paths_transformed(&square(0.0, 0.0, 1.0), Polarity::Dark, &t);
        let area = net_area(ap.additive());
        assert!((area.abs() - 1.0).abs() < 1e-6);
    }
}
