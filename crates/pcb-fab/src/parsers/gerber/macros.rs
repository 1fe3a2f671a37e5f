//! Aperture macros: `%AM` bodies parsed once, instantiated per `%AD`.

use log::{debug, warn};

use crate::aperture::{polygon_shape, Aperture, ShapeKind};
use crate::error::FabError;
use crate::expression::{Expression, Variables};
use crate::geometry::kernel::circle;
use crate::geometry::{signed_area, Path, Paths, Polarity, Transform};
use crate::options::ParseOptions;

/// One `*`-terminated statement of a macro body.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroStatement {
    /// `0 text`
    Comment,
    /// `$n=expression`
    Assign { variable: u32, value: Expression },
    /// Comma-separated fields; the first selects the primitive.
    Primitive(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMacro {
    pub name: String,
    pub statements: Vec<MacroStatement>,
}

impl ApertureMacro {
    /// Parse the statements following `AM<name>`.
    pub fn parse(name: &str, body: &[String]) -> Result<ApertureMacro, FabError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FabError::Format("AM: missing macro name".into()));
        }
        let statements = body
            .iter()
            .map(|s| parse_statement(s.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ApertureMacro {
            name: name.to_string(),
            statements,
        })
    }

    /// Instantiate with `params` bound to `$1..$n`. Geometry is produced in
    /// file units and scaled by `unit_scale` into millimeters.
    pub fn build(
        &self,
        params: &[f64],
        unit_scale: f64,
        opts: &ParseOptions,
    ) -> Result<Aperture, FabError> {
        let mut vars: Variables = params
            .iter()
            .enumerate()
            .map(|(k, &v)| (k as u32 + 1, v))
            .collect();
        let mut aperture = Aperture::new(ShapeKind::Macro {
            name: self.name.clone(),
        });

        for statement in &self.statements {
            match statement {
                MacroStatement::Comment => {}
                MacroStatement::Assign { variable, value } => {
                    let v = value.eval(&vars);
                    vars.insert(*variable, v);
                }
                MacroStatement::Primitive(fields) => {
                    let values: Vec<f64> = fields.iter().map(|f| f.eval(&vars)).collect();
                    draw_primitive(&mut aperture, &values, unit_scale, opts)
                        .map_err(|e| e.in_command(&format!("AM{}", self.name)))?;
                }
            }
        }

        aperture.commit();
        debug!("built macro aperture {} with {} params", self.name, params.len());
        Ok(aperture)
    }
}

fn parse_statement(statement: &str) -> Result<MacroStatement, FabError> {
    let first_field = statement.split(',').next().unwrap_or("").trim();
    if first_field == "0" || first_field.starts_with("0 ") {
        return Ok(MacroStatement::Comment);
    }
    if let Some(assignment) = statement.strip_prefix('$') {
        let (variable, value) = assignment.split_once('=').ok_or_else(|| {
            FabError::MalformedExpression(format!("expected assignment in {statement:?}"))
        })?;
        let variable: u32 = variable.trim().parse().map_err(|_| {
            FabError::MalformedExpression(format!("bad variable in {statement:?}"))
        })?;
        return Ok(MacroStatement::Assign {
            variable,
            value: Expression::parse(value)?,
        });
    }
    let fields = statement
        .split(',')
        .map(Expression::parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MacroStatement::Primitive(fields))
}

fn check_fields(what: &str, values: &[f64], min: usize, max: usize) -> Result<(), FabError> {
    if (min..=max).contains(&values.len()) {
        Ok(())
    } else {
        Err(FabError::Format(format!(
            "{what} primitive needs {min}..={max} fields, got {}",
            values.len()
        )))
    }
}

fn exposure(value: f64) -> Polarity {
    if value > 0.5 {
        Polarity::Dark
    } else {
        Polarity::Clear
    }
}

/// Rotation about the macro origin (degrees) followed by unit scaling.
fn placement(rotation_deg: f64, unit_scale: f64) -> Transform {
    Transform {
        scale: unit_scale,
        rotation: rotation_deg.to_radians(),
        ..Transform::default()
    }
}

fn counter_clockwise(mut path: Path) -> Path {
    if signed_area(&path) < 0.0 {
        path.reverse();
    }
    path
}

fn draw_primitive(
    aperture: &mut Aperture,
    v: &[f64],
    unit_scale: f64,
    opts: &ParseOptions,
) -> Result<(), FabError> {
    let code = v.first().copied().unwrap_or(f64::NAN);
    if code.fract() != 0.0 {
        return Err(FabError::UnsupportedFeature(format!(
            "macro primitive code {code}"
        )));
    }
    // Curves are flattened in file units, so tighten the tolerance to match.
    let local_opts = ParseOptions {
        arc_tolerance: opts.arc_tolerance / unit_scale,
        ..opts.clone()
    };

    match code as i64 {
        1 => {
            check_fields("circle", v, 5, 6)?;
            let shape = vec![circle([v[3], v[4]], v[2] / 2.0, &local_opts)];
            let rotation = v.get(5).copied().unwrap_or(0.0);
            aperture.draw_paths_transformed(&shape, exposure(v[1]), &placement(rotation, unit_scale));
        }
        2 | 20 => {
            check_fields("vector line", v, 8, 8)?;
            let shape = vector_line([v[3], v[4]], [v[5], v[6]], v[2]);
            aperture.draw_paths_transformed(&shape, exposure(v[1]), &placement(v[7], unit_scale));
        }
        21 => {
            check_fields("center line", v, 7, 7)?;
            let (w, h) = (v[2] / 2.0, v[3] / 2.0);
            let (cx, cy) = (v[4], v[5]);
            let shape = vec![vec![
                [cx - w, cy - h],
                [cx + w, cy - h],
                [cx + w, cy + h],
                [cx - w, cy + h],
            ]];
            aperture.draw_paths_transformed(&shape, exposure(v[1]), &placement(v[6], unit_scale));
        }
        4 => {
            let vertices = v.get(2).copied().unwrap_or(0.0);
            if vertices.fract() != 0.0 || vertices < 1.0 || vertices > v.len() as f64 {
                return Err(FabError::Format(format!(
                    "outline primitive vertex count {vertices}"
                )));
            }
            let n = vertices as usize;
            check_fields("outline", v, 2 * n + 6, 2 * n + 6)?;
            let mut points: Path = v[3..3 + 2 * (n + 1)]
                .chunks_exact(2)
                .map(|xy| [xy[0], xy[1]])
                .collect();
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            let rotation = v[2 * n + 5];
            aperture.commit();
            aperture.draw_paths_transformed(
                &[counter_clockwise(points)],
                exposure(v[1]),
                &placement(rotation, unit_scale),
            );
            aperture.commit();
        }
        5 => {
            check_fields("polygon", v, 7, 7)?;
            let vertices = v[2];
            if vertices.fract() != 0.0 || !(3.0..=12.0).contains(&vertices) {
                return Err(FabError::Format(format!(
                    "polygon primitive needs 3 to 12 vertices, got {vertices}"
                )));
            }
            let shape = Transform::translate([v[3], v[4]])
                .apply_paths(&polygon_shape(v[5], vertices as u32, 0.0));
            aperture.draw_paths_transformed(&shape, exposure(v[1]), &placement(v[6], unit_scale));
        }
        6 => {
            check_fields("moire", v, 10, 10)?;
            warn!("moire macro primitive produces no geometry");
        }
        7 => {
            check_fields("thermal", v, 7, 7)?;
            warn!("thermal macro primitive produces no geometry");
        }
        other => {
            return Err(FabError::UnsupportedFeature(format!(
                "macro primitive code {other}"
            )))
        }
    }
    Ok(())
}

/// Rectangle of `width` centered on the segment, with square ends.
fn vector_line(start: [f64; 2], end: [f64; 2], width: f64) -> Paths {
    let (dx, dy) = (end[0] - start[0], end[1] - start[1]);
    let length = dx.hypot(dy);
    if length < 1e-12 || !(width > 0.0) {
        return Vec::new();
    }
    let (nx, ny) = (-dy / length * width / 2.0, dx / length * width / 2.0);
    vec![vec![
        [start[0] - nx, start[1] - ny],
        [end[0] - nx, end[1] - ny],
        [end[0] + nx, end[1] + ny],
        [start[0] + nx, start[1] + ny],
    ]]
}
