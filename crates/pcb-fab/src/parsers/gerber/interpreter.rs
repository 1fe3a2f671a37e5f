use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::aperture::{Aperture, ShapeKind};
use crate::dispatch::{CommandTable, Flow};
use crate::error::FabError;
use crate::format::{CoordinateFormat, Units};
use crate::geometry::arc::{resolve_multi_quadrant, resolve_single_quadrant, ArcDirection};
use crate::geometry::kernel::buffer_polyline;
use crate::geometry::{signed_area, Path, Point, Polarity, Transform};
use crate::options::ParseOptions;

use super::commands::{
    extended_table, parse_aperture_define, parse_coordinate_word, parse_d_code,
    parse_format_spec, word_table, ApertureTemplate, CoordinateWord, DCode, ExtendedCommand,
    Operation, WordCommand,
};
use super::lexer::GerberToken;
use super::macros::ApertureMacro;
use super::GerberImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Undefined,
    Linear,
    CircularCw,
    CircularCcw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadrantMode {
    Undefined,
    Single,
    Multi,
}

/// Everything a Gerber file can change while it is being interpreted.
pub struct GerberSettings {
    extended: CommandTable<ExtendedCommand>,
    words: CommandTable<WordCommand>,
    options: ParseOptions,
    format: CoordinateFormat,
    position: Point,
    polarity: Polarity,
    interpolation: InterpolationMode,
    quadrant: QuadrantMode,
    last_operation: Option<Operation>,
    current_aperture: Option<u32>,
    apertures: HashMap<u32, Aperture>,
    macros: HashMap<String, ApertureMacro>,
    /// Bottom of the aperture stack: the layer image.
    image: Aperture,
    /// Open `%AB` blocks above the image, innermost last.
    blocks: Vec<(u32, Aperture)>,
    region_open: bool,
    contour: Path,
    mirror_x: bool,
    mirror_y: bool,
    /// Degrees.
    rotation: f64,
    scale: f64,
    minimum_thickness: Option<f64>,
}

impl GerberSettings {
    pub fn new(options: &ParseOptions) -> Self {
        Self {
            extended: extended_table(),
            words: word_table(),
            options: options.clone(),
            format: CoordinateFormat::default(),
            position: [0.0, 0.0],
            polarity: Polarity::Dark,
            interpolation: InterpolationMode::Undefined,
            quadrant: QuadrantMode::Undefined,
            last_operation: None,
            current_aperture: None,
            apertures: HashMap::new(),
            macros: HashMap::new(),
            image: Aperture::block(),
            blocks: Vec::new(),
            region_open: false,
            contour: Vec::new(),
            mirror_x: false,
            mirror_y: false,
            rotation: 0.0,
            scale: 1.0,
            minimum_thickness: None,
        }
    }

    /// Top of the aperture stack.
    fn layer(&mut self) -> &mut Aperture {
        match self.blocks.last_mut() {
            Some((_, block)) => block,
            None => &mut self.image,
        }
    }

    /// Handle one `%...%` block. An `%AM` block is consumed whole.
    pub fn process_extended(&mut self, statements: &[String]) -> Result<Flow, FabError> {
        let Some(first) = statements.first() else {
            return Ok(Flow::Continue);
        };
        if let Some((_, ExtendedCommand::ApertureMacro)) = self.extended.resolve(first) {
            let aperture_macro = ApertureMacro::parse(&first[2..], &statements[1..])
                .map_err(|e| e.in_command(first))?;
            debug!(
                "defined macro {} ({} statements)",
                aperture_macro.name,
                aperture_macro.statements.len()
            );
            self.macros
                .insert(aperture_macro.name.clone(), aperture_macro);
            return Ok(Flow::Continue);
        }
        for statement in statements {
            self.extended_statement(statement)
                .map_err(|e| e.in_command(statement))?;
        }
        Ok(Flow::Continue)
    }

    fn extended_statement(&mut self, statement: &str) -> Result<(), FabError> {
        let Some((prefix, kind)) = self.extended.resolve(statement) else {
            trace!("ignoring extended command {statement}");
            return Ok(());
        };
        let args = &statement[prefix.len()..];
        match kind {
            ExtendedCommand::FormatSpec => {
                let spec = parse_format_spec(statement)?;
                self.format.configure_trailing_zeros(spec.zeros)?;
                self.format
                    .configure_format(spec.integer_digits, spec.decimal_digits)?;
            }
            ExtendedCommand::Units => {
                let units = match args {
                    "MM" => Units::Millimeters,
                    "IN" => Units::Inches,
                    other => return Err(FabError::Format(format!("unknown units {other:?}"))),
                };
                self.format.configure_units(units)?;
            }
            ExtendedCommand::ApertureDefine => self.define_aperture(statement)?,
            ExtendedCommand::ApertureMacro => {
                return Err(FabError::Format(
                    "AM must open its own extended block".into(),
                ))
            }
            ExtendedCommand::ApertureBlock => self.aperture_block(args)?,
            ExtendedCommand::LoadPolarity => {
                self.polarity = match args {
                    "D" => Polarity::Dark,
                    "C" => Polarity::Clear,
                    other => {
                        return Err(FabError::Format(format!("unknown polarity {other:?}")))
                    }
                };
                debug!("polarity {:?}", self.polarity);
            }
            ExtendedCommand::LoadMirroring => {
                (self.mirror_x, self.mirror_y) = match args {
                    "N" => (false, false),
                    "X" => (true, false),
                    "Y" => (false, true),
                    "XY" => (true, true),
                    other => {
                        return Err(FabError::Format(format!("unknown mirroring {other:?}")))
                    }
                };
            }
            ExtendedCommand::LoadRotation => self.rotation = parse_number(args, "LR")?,
            ExtendedCommand::LoadScaling => {
                let scale = parse_number(args, "LS")?;
                if scale <= 0.0 {
                    return Err(FabError::Format(format!("scale factor {scale} must be positive")));
                }
                self.scale = scale;
            }
            ExtendedCommand::StepRepeat => {
                let is_identity = args.is_empty() || args.starts_with("X1Y1I");
                if !is_identity {
                    warn!("step-and-repeat {statement} is not expanded");
                }
            }
        }
        Ok(())
    }

    fn define_aperture(&mut self, statement: &str) -> Result<(), FabError> {
        let (code, template) = parse_aperture_define(statement)?;
        let factor = self.format.units().factor();
        let aperture = match template {
            ApertureTemplate::Standard { kind, hole } => {
                let kind = match kind {
                    ShapeKind::Circle { diameter } => ShapeKind::Circle {
                        diameter: diameter * factor,
                    },
                    ShapeKind::Rectangle { width, height } => ShapeKind::Rectangle {
                        width: width * factor,
                        height: height * factor,
                    },
                    ShapeKind::Obround { width, height } => ShapeKind::Obround {
                        width: width * factor,
                        height: height * factor,
                    },
                    ShapeKind::Polygon {
                        diameter,
                        vertices,
                        rotation,
                    } => ShapeKind::Polygon {
                        diameter: diameter * factor,
                        vertices,
                        rotation,
                    },
                    other => other,
                };
                Aperture::standard(kind, hole.map(|h| h * factor), &self.options)?
            }
            ApertureTemplate::Macro { name, params } => {
                let aperture_macro = self
                    .macros
                    .get(&name)
                    .ok_or_else(|| FabError::State(format!("undefined macro {name}")))?;
                aperture_macro.build(&params, factor, &self.options)?
            }
        };
        if self.apertures.insert(code, aperture).is_some() {
            warn!("aperture D{code} redefined");
        }
        Ok(())
    }

    fn aperture_block(&mut self, args: &str) -> Result<(), FabError> {
        if args.is_empty() {
            let (code, mut block) = self
                .blocks
                .pop()
                .ok_or_else(|| FabError::State("block aperture closed but none is open".into()))?;
            block.commit();
            debug!("closed block aperture D{code}");
            self.apertures.insert(code, block);
            return Ok(());
        }
        let digits = args
            .strip_prefix('D')
            .ok_or_else(|| FabError::Format(format!("bad block aperture {args:?}")))?;
        match parse_d_code(digits)? {
            DCode::Select(code) => {
                debug!("opened block aperture D{code}");
                self.blocks.push((code, Aperture::block()));
                Ok(())
            }
            DCode::Operation(_) => Err(FabError::Format(format!(
                "block aperture code D{digits} is reserved"
            ))),
        }
    }

    /// Handle one `*`-terminated word. Mode codes may prefix coordinate data,
    /// so the word is consumed code by code.
    pub fn process_word(&mut self, word: &str) -> Result<Flow, FabError> {
        let mut rest = word;
        while !rest.is_empty() {
            let Some((prefix, kind)) = self.words.resolve(rest) else {
                trace!("ignoring {rest}");
                return Ok(Flow::Continue);
            };
            let after = &rest[prefix.len()..];
            if kind.is_numbered_code() && after.starts_with(|c: char| c.is_ascii_digit()) {
                trace!("ignoring {rest}");
                return Ok(Flow::Continue);
            }
            match kind {
                WordCommand::Linear => self.set_interpolation(InterpolationMode::Linear),
                WordCommand::Clockwise => self.set_interpolation(InterpolationMode::CircularCw),
                WordCommand::CounterClockwise => {
                    self.set_interpolation(InterpolationMode::CircularCcw)
                }
                WordCommand::RegionOpen => {
                    if self.region_open {
                        return Err(FabError::State("G36 while a region is open".into()));
                    }
                    self.region_open = true;
                    self.contour.clear();
                }
                WordCommand::RegionClose => {
                    if !self.region_open {
                        return Err(FabError::State("G37 without an open region".into()));
                    }
                    self.close_contour();
                    self.region_open = false;
                }
                WordCommand::SingleQuadrant => self.quadrant = QuadrantMode::Single,
                WordCommand::MultiQuadrant => self.quadrant = QuadrantMode::Multi,
                WordCommand::Inches => self.format.configure_units(Units::Inches)?,
                WordCommand::Millimeters => self.format.configure_units(Units::Millimeters)?,
                WordCommand::Absolute | WordCommand::LegacyPrefix => {}
                WordCommand::Incremental => {
                    return Err(FabError::UnsupportedFeature(
                        "incremental coordinates".into(),
                    ))
                }
                WordCommand::EndOfFile => return Ok(Flow::Stop),
                WordCommand::DCode => {
                    match parse_d_code(after)? {
                        DCode::Select(code) => {
                            if !self.apertures.contains_key(&code) {
                                return Err(FabError::State(format!("undefined aperture D{code}")));
                            }
                            self.current_aperture = Some(code);
                        }
                        DCode::Operation(op) => self.operate(op, &CoordinateWord::default())?,
                    }
                    return Ok(Flow::Continue);
                }
                WordCommand::Coordinate => {
                    let coordinates = parse_coordinate_word(rest)?;
                    let op = coordinates
                        .d
                        .or(self.last_operation)
                        .ok_or_else(|| FabError::State("coordinates without an operation".into()))?;
                    self.operate(op, &coordinates)?;
                    return Ok(Flow::Continue);
                }
            }
            rest = after;
        }
        Ok(Flow::Continue)
    }

    fn set_interpolation(&mut self, mode: InterpolationMode) {
        if mode != self.interpolation {
            debug!("interpolation {mode:?}");
        }
        self.interpolation = mode;
    }

    fn coordinate(&mut self, token: Option<&str>, current: f64) -> Result<f64, FabError> {
        match token {
            Some(token) => self.format.parse_fixed(token),
            None => Ok(current),
        }
    }

    fn operate(&mut self, op: Operation, word: &CoordinateWord<'_>) -> Result<(), FabError> {
        self.last_operation = Some(op);
        let target = [
            self.coordinate(word.x, self.position[0])?,
            self.coordinate(word.y, self.position[1])?,
        ];
        let offset = [self.coordinate(word.i, 0.0)?, self.coordinate(word.j, 0.0)?];
        match op {
            Operation::Interpolate => self.interpolate(target, offset)?,
            Operation::Move => {
                if self.region_open {
                    self.close_contour();
                }
            }
            Operation::Flash => self.flash(target)?,
        }
        self.position = target;
        Ok(())
    }

    fn arc_path(&self, target: Point, offset: Point, direction: ArcDirection) -> Result<Path, FabError> {
        let start = self.position;
        let arc = match self.quadrant {
            QuadrantMode::Multi => resolve_multi_quadrant(
                start,
                target,
                [start[0] + offset[0], start[1] + offset[1]],
                direction,
            ),
            QuadrantMode::Single | QuadrantMode::Undefined => {
                resolve_single_quadrant(start, target, offset, direction).ok_or_else(|| {
                    FabError::State(format!(
                        "no single-quadrant arc from {start:?} to {target:?}"
                    ))
                })?
            }
        };
        Ok(arc.flatten(self.options.arc_tolerance))
    }

    fn interpolate(&mut self, target: Point, offset: Point) -> Result<(), FabError> {
        let path = match self.interpolation {
            InterpolationMode::Undefined => {
                return Err(FabError::State(
                    "D01 before any interpolation mode".into(),
                ))
            }
            InterpolationMode::Linear => vec![self.position, target],
            InterpolationMode::CircularCw => {
                self.arc_path(target, offset, ArcDirection::Clockwise)?
            }
            InterpolationMode::CircularCcw => {
                self.arc_path(target, offset, ArcDirection::CounterClockwise)?
            }
        };

        if self.region_open {
            if self.contour.is_empty() {
                self.contour.push(self.position);
            }
            self.contour.extend(path.into_iter().skip(1));
            return Ok(());
        }

        let code = self
            .current_aperture
            .ok_or_else(|| FabError::State("D01 without a selected aperture".into()))?;
        let diameter = self
            .apertures
            .get(&code)
            .and_then(Aperture::is_simple_circle)
            .ok_or_else(|| {
                FabError::State(format!("D{code} cannot stroke: not a plain circle"))
            })?;
        let width = diameter * self.scale;
        let stroke = buffer_polyline(&path, width, &self.options);
        let polarity = self.polarity;
        self.layer().draw_paths(stroke, polarity);
        if polarity == Polarity::Dark && width > 0.0 {
            self.minimum_thickness = Some(
                self.minimum_thickness
                    .map_or(width, |current| current.min(width)),
            );
        }
        Ok(())
    }

    fn flash(&mut self, target: Point) -> Result<(), FabError> {
        if self.region_open {
            return Err(FabError::State("D03 inside a region".into()));
        }
        let code = self
            .current_aperture
            .ok_or_else(|| FabError::State("D03 without a selected aperture".into()))?;
        let transform = Transform {
            scale: self.scale,
            mirror_x: self.mirror_x,
            mirror_y: self.mirror_y,
            rotation: self.rotation.to_radians(),
            offset: target,
        };
        let aperture = self
            .apertures
            .get_mut(&code)
            .ok_or_else(|| FabError::State(format!("undefined aperture D{code}")))?;
        let layer = match self.blocks.last_mut() {
            Some((_, block)) => block,
            None => &mut self.image,
        };
        layer.draw_aperture(aperture, self.polarity, &transform);
        Ok(())
    }

    /// Draw the contour gathered so far, if it encloses anything.
    fn close_contour(&mut self) {
        let mut contour = std::mem::take(&mut self.contour);
        if contour.len() < 3 {
            if !contour.is_empty() {
                debug!("discarding region contour of {} point(s)", contour.len());
            }
            return;
        }
        if signed_area(&contour) < 0.0 {
            contour.reverse();
        }
        let polarity = self.polarity;
        self.layer().draw_paths(vec![contour], polarity);
    }

    /// Validate the end state and hand over the image.
    pub fn finish(self) -> Result<GerberImage, FabError> {
        if let Some((code, _)) = self.blocks.last() {
            return Err(FabError::State(format!(
                "block aperture D{code} still open at end of file"
            )));
        }
        if self.region_open {
            return Err(FabError::State("region still open at end of file".into()));
        }
        Ok(GerberImage::new(
            self.image.into_additive(),
            self.minimum_thickness,
        ))
    }
}

fn parse_number(args: &str, what: &str) -> Result<f64, FabError> {
    args.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FabError::Format(format!("{what}: bad number {args:?}")))
}

/// Run a token stream through a fresh settings record.
pub fn interpret(tokens: &[GerberToken], options: &ParseOptions) -> Result<GerberImage, FabError> {
    let mut settings = GerberSettings::new(options);
    for token in tokens {
        let flow = match token {
            GerberToken::Extended(statements) => settings.process_extended(statements)?,
            GerberToken::Word(word) => settings
                .process_word(word)
                .map_err(|e| e.in_command(word))?,
        };
        if flow == Flow::Stop {
            debug!("end of program");
            break;
        }
    }
    settings.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{bounds, net_area};
    use crate::parsers::gerber::lexer::tokenize;
    use std::f64::consts::PI;

    const HEADER: &str = "%FSLAX24Y24*%\n%MOMM*%\n%ADD10C,0.1*%\n";

    fn run(body: &str) -> Result<GerberImage, FabError> {
        let input = format!("{HEADER}{body}");
        interpret(&tokenize(&input), &ParseOptions::default())
    }

    fn area(image: &GerberImage) -> f64 {
        net_area(&image.result(false)).abs()
    }

    #[test]
    fn test_linear_stroke() {
        let image = run("D10*\nX0Y0D02*\nG01X10000Y0D01*\nM02*\n").unwrap();
        let expected = 1.0 * 0.1 + PI * 0.05 * 0.05;
        assert!((area(&image) - expected).abs() < 1e-3);
        assert_eq!(image.minimum_thickness(), Some(0.1));
    }

    #[test]
    fn test_coordinates_reuse_last_operation() {
        let image = run("D10*\nG01*\nX0Y0D02*\nX10000D01*\nY10000*\nM02*\n").unwrap();
        let (lo, hi) = bounds(&image.result(false)).unwrap();
        assert!((hi[0] - 1.05).abs() < 1e-3);
        assert!((hi[1] - 1.05).abs() < 1e-3);
        assert!((lo[0] + 0.05).abs() < 1e-3);
    }

    #[test]
    fn test_flash_rectangle_with_rotation_and_scale() {
        let image = run("%ADD12R,2X1*%\n%LR90*%\n%LS2*%\nD12*\nX50000Y0D03*\nM02*\n").unwrap();
        let (lo, hi) = bounds(&image.result(false)).unwrap();
        assert!((hi[0] - lo[0] - 2.0).abs() < 1e-6);
        assert!((hi[1] - lo[1] - 4.0).abs() < 1e-6);
        assert!(((lo[0] + hi[0]) / 2.0 - 5.0).abs() < 1e-6);
        assert!((area(&image) - 8.0).abs() < 1e-6);
        assert_eq!(image.minimum_thickness(), None);
    }

    #[test]
    fn test_mirroring_applies_to_flash() {
        let image = run("%AMTRI*4,1,3,0,0,1,0,0,1,0,0,0*%\n%ADD13TRI*%\n%LMX*%\nD13*\nX0Y0D03*\nM02*\n")
            .unwrap();
        let (lo, hi) = bounds(&image.result(false)).unwrap();
        assert!((lo[0] + 1.0).abs() < 1e-6);
        assert!(hi[0].abs() < 1e-6);
        assert!((area(&image) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_region_winding_does_not_matter() {
        let ccw = run("G36*\nX0Y0D02*\nG01X10000Y0D01*\nX0Y10000D01*\nX0Y0D01*\nG37*\nM02*\n")
            .unwrap();
        let cw = run("G36*\nX0Y0D02*\nG01X0Y10000D01*\nX10000Y0D01*\nX0Y0D01*\nG37*\nM02*\n")
            .unwrap();
        assert!((area(&ccw) - 0.5).abs() < 1e-6);
        assert!((area(&cw) - area(&ccw)).abs() < 1e-9);
        assert_eq!(bounds(&cw.result(false)), bounds(&ccw.result(false)));
    }

    #[test]
    fn test_region_with_two_points_is_discarded() {
        let image = run("G36*\nX0Y0D02*\nG01X10000Y0D01*\nG37*\nM02*\n").unwrap();
        assert!(image.result(false).is_empty());
    }

    #[test]
    fn test_region_split_by_move() {
        let image = run(concat!(
            "G36*\nX0Y0D02*\nG01X10000Y0D01*\nX10000Y10000D01*\nX0Y10000D01*\nX0Y0D01*\n",
            "X30000Y0D02*\nX40000Y0D01*\nX40000Y10000D01*\nX30000Y10000D01*\nX30000Y0D01*\n",
            "G37*\nM02*\n"
        ))
        .unwrap();
        assert_eq!(image.result(false).len(), 2);
        assert!((area(&image) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_quadrant_arc_region() {
        let image = run(
            "G36*\nX0Y0D02*\nG01X10000Y0D01*\nG74*\nG03X0Y10000I10000J0D01*\nG01X0Y0D01*\nG37*\nM02*\n",
        )
        .unwrap();
        assert!((area(&image) - PI / 4.0).abs() < 0.01);
    }

    #[test]
    fn test_multi_quadrant_full_circle_stroke() {
        let image = run("D10*\nX10000Y0D02*\nG75*\nG03X10000Y0I-10000J0D01*\nM02*\n").unwrap();
        let ring = PI * (1.05 * 1.05 - 0.95 * 0.95);
        assert!((area(&image) - ring).abs() < 0.01, "area {}", area(&image));
    }

    #[test]
    fn test_clear_polarity_subtracts() {
        let image = run(concat!(
            "%ADD11R,2X2*%\n%ADD12R,1X1*%\n",
            "D11*\nX0Y0D03*\n%LPC*%\nD12*\nX0Y0D03*\n%LPD*%\nM02*\n"
        ))
        .unwrap();
        assert!((area(&image) - 3.0).abs() < 1e-6);
        assert_eq!(image.result(false).len(), 2);
    }

    #[test]
    fn test_block_aperture() {
        let image = run(concat!(
            "%ADD11C,1*%\n",
            "%ABD20*%\nD11*\nX0Y0D03*\nX20000Y0D03*\n%AB*%\n",
            "D20*\nX0Y0D03*\nX0Y50000D03*\nM02*\n"
        ))
        .unwrap();
        assert_eq!(image.result(false).len(), 4);
        assert!((area(&image) - PI).abs() < 0.02);
    }

    #[test]
    fn test_macro_clear_primitive_clears_layer() {
        let image = run(concat!(
            "%AMDONUT*1,1,$1,0,0*1,0,$2,0,0*%\n",
            "%ADD11DONUT,2X1*%\n%ADD12R,4X4*%\n",
            "D12*\nX0Y0D03*\nD11*\nX0Y0D03*\nM02*\n"
        ))
        .unwrap();
        assert!((area(&image) - (16.0 - PI * 0.25)).abs() < 0.02);

        let image = run(concat!(
            "%AMHOLE*1,0,2,0,0*%\n%ADD11HOLE*%\n%ADD12R,4X4*%\n",
            "D12*\nX0Y0D03*\nD11*\nX0Y0D03*\nM02*\n"
        ))
        .unwrap();
        assert!((area(&image) - (16.0 - PI)).abs() < 0.02);
    }

    #[test]
    fn test_aperture_hole_clears_layer() {
        let image = run(concat!(
            "%ADD11C,2X1*%\n%ADD12R,4X4*%\n",
            "D12*\nX0Y0D03*\nD11*\nX0Y0D03*\nM02*\n"
        ))
        .unwrap();
        assert!((area(&image) - (16.0 - PI * 0.25)).abs() < 0.02);
        assert_eq!(image.result(false).len(), 2);
    }

    #[test]
    fn test_inches() {
        // Aperture definitions do not freeze the units; coordinates do.
        let image = run("%ADD11R,0.1X0.1*%\nG70*\nD11*\nX10000Y0D03*\nM02*\n").unwrap();
        let (lo, hi) = bounds(&image.result(false)).unwrap();
        assert!(((lo[0] + hi[0]) / 2.0 - 25.4).abs() < 1e-6);
        // Defined while millimeters were in force.
        assert!((hi[0] - lo[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_state_errors() {
        let cases = [
            "G37*\n",
            "G36*\nG36*\n",
            "G36*\nD10*\nX0Y0D03*\n",
            "D10*\nX100Y100D01*\n",
            "D99*\n",
            "%AB*%\n",
            "%ABD20*%\nM02*\n",
            "G36*\nX0Y0D02*\nM02*\n",
            "X100Y100*\n",
            "%ADD11UNDEFINED*%\n",
        ];
        for body in cases {
            let err = run(body).unwrap_err();
            assert!(matches!(err.root(), FabError::State(_)), "{body:?} gave {err:?}");
        }
    }

    #[test]
    fn test_missing_m02_still_validated() {
        assert!(run("D10*\nX0Y0D02*\nG01X100Y0D01*\n").is_ok());
        assert!(matches!(
            run("G36*\n").unwrap_err().root(),
            FabError::State(_)
        ));
    }

    #[test]
    fn test_stroke_requires_plain_circle() {
        let err = run("%ADD11R,1X1*%\nD11*\nG01*\nX0Y0D02*\nX100Y0D01*\n").unwrap_err();
        assert!(matches!(err.root(), FabError::State(_)));
        let err = run("%ADD11C,1X0.5*%\nD11*\nG01*\nX0Y0D02*\nX100Y0D01*\n").unwrap_err();
        assert!(matches!(err.root(), FabError::State(_)));
    }

    #[test]
    fn test_unsupported_features() {
        for input in [
            "%FSLIX24Y24*%\n",
            "G91*\n",
        ] {
            let err = interpret(&tokenize(input), &ParseOptions::default()).unwrap_err();
            assert!(
                matches!(err.root(), FabError::UnsupportedFeature(_)),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_units_frozen_after_coordinate() {
        let err = run("D10*\nX0Y0D02*\n%MOIN*%\n").unwrap_err();
        assert!(matches!(err.root(), FabError::Format(_)));
        // Restating millimeters is harmless.
        assert!(run("D10*\nX0Y0D02*\n%MOMM*%\nM02*\n").is_ok());
    }

    #[test]
    fn test_input_after_m02_is_ignored() {
        assert!(run("M02*\nG36*\n").is_ok());
    }

    #[test]
    fn test_error_carries_command() {
        let err = run("D99*\n").unwrap_err();
        match err {
            FabError::Command { command, .. } => assert_eq!(command, "D99"),
            other => panic!("expected Command, got: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_commands_ignored() {
        let image = run("%TF.FileFunction,Copper,L1,Top*%\n%IPPOS*%\nG04 hello*\nG54D10*\nM02*\n");
        assert!(image.is_ok());
    }
}
