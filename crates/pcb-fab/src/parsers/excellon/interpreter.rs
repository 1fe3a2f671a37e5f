use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::aperture::Aperture;
use crate::dispatch::{CommandTable, Flow};
use crate::error::FabError;
use crate::format::{CoordinateFormat, Units};
use crate::geometry::arc::{center_from_radius, ArcDirection, PolarArc};
use crate::geometry::kernel::buffer_polyline;
use crate::geometry::{Path, Point, Polarity};
use crate::options::ParseOptions;

use super::commands::{
    claims, default_digits, excellon_table, parse_coordinates, parse_tool, parse_units_line,
    split_slot, CoordinateLine, ExcellonCommand,
};
use super::DrillLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    PreHeader,
    Header,
    Body,
}

/// Whether motion cuts material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutMode {
    Drill,
    RoutToolUp,
    RoutToolDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoutInterpolation {
    Linear,
    Arc(ArcDirection),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tool {
    /// Millimeters.
    pub diameter: f64,
    pub plated: bool,
}

pub struct ExcellonSettings {
    table: CommandTable<ExcellonCommand>,
    options: ParseOptions,
    format: CoordinateFormat,
    /// Digit widths came from the file rather than the unit defaults.
    explicit_format: bool,
    state: ParseState,
    rout: RoutMode,
    interpolation: RoutInterpolation,
    tools: HashMap<u32, Tool>,
    current_tool: Option<u32>,
    /// Plating given to tools defined from now on.
    plated_hint: bool,
    position: Point,
    path: Path,
    plated: Aperture,
    non_plated: Aperture,
    minimum_diameter: Option<f64>,
}

impl ExcellonSettings {
    pub fn new(options: &ParseOptions) -> Self {
        let (integer, decimal) = default_digits(Units::Millimeters);
        Self {
            table: excellon_table(),
            options: options.clone(),
            format: CoordinateFormat::new(integer, decimal),
            explicit_format: false,
            state: ParseState::PreHeader,
            rout: RoutMode::Drill,
            interpolation: RoutInterpolation::Linear,
            tools: HashMap::new(),
            current_tool: None,
            plated_hint: true,
            position: [0.0, 0.0],
            path: Vec::new(),
            plated: Aperture::block(),
            non_plated: Aperture::block(),
            minimum_diameter: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn rout_mode(&self) -> RoutMode {
        self.rout
    }

    pub fn process_line(&mut self, line: &str) -> Result<Flow, FabError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        if let Some(comment) = line.strip_prefix(';') {
            self.comment(comment);
            return Ok(Flow::Continue);
        }

        let upper = line.to_ascii_uppercase();
        let Some((prefix, kind)) = self.table.resolve(&upper) else {
            trace!("ignoring {line}");
            return Ok(Flow::Continue);
        };
        let args = &upper[prefix.len()..];
        if !claims(prefix, args) {
            trace!("ignoring {line}");
            return Ok(Flow::Continue);
        }

        if self.state == ParseState::PreHeader && kind != ExcellonCommand::HeaderStart {
            trace!("ignoring {line} before M48");
            return Ok(Flow::Continue);
        }

        match kind {
            ExcellonCommand::HeaderStart => {
                if self.state == ParseState::PreHeader {
                    debug!("header");
                    self.state = ParseState::Header;
                }
            }
            ExcellonCommand::HeaderEnd => {
                if self.state == ParseState::Header {
                    debug!("body");
                    self.state = ParseState::Body;
                }
            }
            ExcellonCommand::Metric => self.units_line(Units::Millimeters, &upper)?,
            ExcellonCommand::Inch => self.units_line(Units::Inches, &upper)?,
            ExcellonCommand::MetricMode => self.set_units(Units::Millimeters, None)?,
            ExcellonCommand::InchMode => self.set_units(Units::Inches, None)?,
            ExcellonCommand::FormatVersion => match args.trim_start_matches(',').trim() {
                "2" => {}
                "1" => {
                    return Err(FabError::UnsupportedFeature(
                        "legacy Excellon format version 1".into(),
                    ))
                }
                other => {
                    return Err(FabError::Format(format!("unknown format version {other:?}")))
                }
            },
            ExcellonCommand::IncrementalInput => {
                if args.trim_start_matches(',').trim() == "ON" {
                    return Err(FabError::UnsupportedFeature(
                        "incremental input of program coordinates".into(),
                    ));
                }
            }
            ExcellonCommand::Comment => {}
            ExcellonCommand::Tool => {
                if !args.starts_with(|c: char| c.is_ascii_digit()) {
                    trace!("ignoring {line}");
                } else {
                    self.tool(&upper)?;
                }
            }
            ExcellonCommand::Absolute => {}
            ExcellonCommand::Incremental => {
                return Err(FabError::UnsupportedFeature(
                    "incremental coordinates".into(),
                ))
            }
            ExcellonCommand::EndOfProgram => return Ok(Flow::Stop),
            motion => {
                if self.state != ParseState::Body {
                    return Err(FabError::State(format!("{line} inside the header")));
                }
                self.motion(motion, &upper, args)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn comment(&mut self, comment: &str) {
        let upper = comment.trim().to_ascii_uppercase();
        let hint = if let Some(kind) = upper.strip_prefix("TYPE=") {
            match kind.trim() {
                "PLATED" => Some(true),
                "NON_PLATED" => Some(false),
                _ => None,
            }
        } else if let Some(attribute) = upper
            .strip_prefix("#@!")
            .map(str::trim_start)
            .and_then(|s| s.strip_prefix("TA.APERFUNCTION,"))
        {
            match attribute.split(',').next().map(str::trim) {
                Some("PLATED") => Some(true),
                Some("NONPLATED") => Some(false),
                _ => None,
            }
        } else {
            None
        };
        if let Some(plated) = hint {
            debug!("tools defined from here on are {}", if plated { "plated" } else { "non-plated" });
            self.plated_hint = plated;
        }
    }

    fn units_line(&mut self, units: Units, line: &str) -> Result<(), FabError> {
        let parsed = parse_units_line(units, line)?;
        if let Some(zeros) = parsed.zeros {
            self.format.configure_trailing_zeros(zeros)?;
        }
        self.set_units(parsed.units, parsed.digits)
    }

    fn set_units(&mut self, units: Units, digits: Option<(u8, u8)>) -> Result<(), FabError> {
        self.format.configure_units(units)?;
        match digits {
            Some((integer, decimal)) => {
                self.format.configure_format(integer, decimal)?;
                self.explicit_format = true;
            }
            None if !self.explicit_format => {
                let (integer, decimal) = default_digits(units);
                self.format.configure_format(integer, decimal)?;
            }
            None => {}
        }
        Ok(())
    }

    fn tool(&mut self, line: &str) -> Result<(), FabError> {
        let word = parse_tool(line)?;
        if let Some(diameter) = word.diameter {
            let tool = Tool {
                diameter: self.format.to_fixed(diameter),
                plated: self.plated_hint,
            };
            debug!("tool T{} {:?}", word.number, tool);
            self.tools.insert(word.number, tool);
            if self.state == ParseState::Header {
                return Ok(());
            }
        } else if self.state == ParseState::Header {
            return Err(FabError::Format(format!(
                "tool T{} defined without a diameter",
                word.number
            )));
        }

        if self.rout == RoutMode::RoutToolDown {
            return Err(FabError::State("tool change while the tool is down".into()));
        }
        if word.number == 0 {
            self.current_tool = None;
            return Ok(());
        }
        if !self.tools.contains_key(&word.number) {
            return Err(FabError::State(format!("undefined tool T{}", word.number)));
        }
        self.current_tool = Some(word.number);
        Ok(())
    }

    fn active_tool(&self) -> Result<Tool, FabError> {
        self.current_tool
            .and_then(|number| self.tools.get(&number))
            .copied()
            .ok_or_else(|| FabError::State("no tool selected".into()))
    }

    fn motion(&mut self, kind: ExcellonCommand, line: &str, args: &str) -> Result<(), FabError> {
        match kind {
            ExcellonCommand::DrillMode => {
                if self.rout == RoutMode::RoutToolDown {
                    return Err(FabError::State("drill mode while the tool is down".into()));
                }
                self.set_rout(RoutMode::Drill);
            }
            ExcellonCommand::RoutMove => {
                if self.rout == RoutMode::RoutToolDown {
                    return Err(FabError::State("rout move while the tool is down".into()));
                }
                self.set_rout(RoutMode::RoutToolUp);
                self.coordinates(args)?;
            }
            ExcellonCommand::RoutLinear
            | ExcellonCommand::RoutClockwise
            | ExcellonCommand::RoutCounterClockwise => {
                self.interpolation = match kind {
                    ExcellonCommand::RoutClockwise => RoutInterpolation::Arc(ArcDirection::Clockwise),
                    ExcellonCommand::RoutCounterClockwise => {
                        RoutInterpolation::Arc(ArcDirection::CounterClockwise)
                    }
                    _ => RoutInterpolation::Linear,
                };
                if !args.is_empty() {
                    if self.rout == RoutMode::Drill {
                        return Err(FabError::State(format!("{line} in drill mode")));
                    }
                    self.coordinates(args)?;
                }
            }
            ExcellonCommand::ToolDown => {
                match self.rout {
                    RoutMode::Drill => {
                        return Err(FabError::State("tool down in drill mode".into()))
                    }
                    RoutMode::RoutToolDown => {
                        return Err(FabError::State("tool is already down".into()))
                    }
                    RoutMode::RoutToolUp => {}
                }
                self.active_tool()?;
                self.path = vec![self.position];
                self.set_rout(RoutMode::RoutToolDown);
            }
            ExcellonCommand::ToolUp => {
                match self.rout {
                    RoutMode::Drill => return Err(FabError::State("tool up in drill mode".into())),
                    RoutMode::RoutToolUp => {
                        return Err(FabError::State("tool is already up".into()))
                    }
                    RoutMode::RoutToolDown => {}
                }
                let path = std::mem::take(&mut self.path);
                self.commit(&path)?;
                self.set_rout(RoutMode::RoutToolUp);
            }
            ExcellonCommand::Coordinate => match split_slot(line) {
                Some((first, second)) => self.slot(first, second)?,
                None => self.coordinates(line)?,
            },
            other => trace!("ignoring {other:?} in the body"),
        }
        Ok(())
    }

    fn set_rout(&mut self, mode: RoutMode) {
        if mode != self.rout {
            debug!("rout mode {mode:?}");
        }
        self.rout = mode;
    }

    /// Resolve X/Y against `from`; a missing axis keeps its value.
    fn target(&mut self, coords: &CoordinateLine<'_>, from: Point) -> Result<Point, FabError> {
        let x = match coords.x {
            Some(x) => self.format.parse_fixed(x)?,
            None => from[0],
        };
        let y = match coords.y {
            Some(y) => self.format.parse_fixed(y)?,
            None => from[1],
        };
        Ok([x, y])
    }

    fn coordinates(&mut self, text: &str) -> Result<(), FabError> {
        let coords = parse_coordinates(text)?;
        if coords.is_empty() {
            return Ok(());
        }
        self.active_tool()?;
        let target = self.target(&coords, self.position)?;
        match self.rout {
            RoutMode::Drill => self.commit(&[target])?,
            RoutMode::RoutToolUp => {}
            RoutMode::RoutToolDown => match self.interpolation {
                RoutInterpolation::Linear => self.path.push(target),
                RoutInterpolation::Arc(direction) => {
                    let arc = self.arc(&coords, target, direction)?;
                    self.path.extend(arc.into_iter().skip(1));
                }
            },
        }
        self.position = target;
        Ok(())
    }

    fn arc(
        &mut self,
        coords: &CoordinateLine<'_>,
        end: Point,
        direction: ArcDirection,
    ) -> Result<Path, FabError> {
        let start = self.position;
        let center = if let Some(radius) = coords.a {
            let radius = self.format.parse_fixed(radius)?;
            center_from_radius(start, end, radius, direction)?
        } else if coords.i.is_some() || coords.j.is_some() {
            let i = coords.i.map(|i| self.format.parse_fixed(i)).transpose()?;
            let j = coords.j.map(|j| self.format.parse_fixed(j)).transpose()?;
            [start[0] + i.unwrap_or(0.0), start[1] + j.unwrap_or(0.0)]
        } else {
            return Err(FabError::Format("arc without a radius or center".into()));
        };
        Ok(PolarArc::new(start, end, center, direction).flatten(self.options.arc_tolerance))
    }

    /// `X..Y..G85X..Y..`: a routed slot between the two points.
    fn slot(&mut self, first: &str, second: &str) -> Result<(), FabError> {
        if self.rout == RoutMode::RoutToolDown {
            return Err(FabError::State("slot while the tool is down".into()));
        }
        self.active_tool()?;
        let start = self.target(&parse_coordinates(first)?, self.position)?;
        let end = self.target(&parse_coordinates(second)?, start)?;
        self.commit(&[start, end])?;
        self.position = end;
        Ok(())
    }

    /// Stamp `points` at the active tool's diameter.
    fn commit(&mut self, points: &[Point]) -> Result<(), FabError> {
        let tool = self.active_tool()?;
        let outline = buffer_polyline(points, tool.diameter, &self.options);
        let store = if tool.plated {
            &mut self.plated
        } else {
            &mut self.non_plated
        };
        store.draw_paths(outline, Polarity::Dark);
        if tool.diameter > 0.0 {
            self.minimum_diameter = Some(
                self.minimum_diameter
                    .map_or(tool.diameter, |current| current.min(tool.diameter)),
            );
        }
        Ok(())
    }

    pub fn finish(self) -> Result<DrillLayer, FabError> {
        if self.rout == RoutMode::RoutToolDown {
            return Err(FabError::State("tool still down at end of file".into()));
        }
        if self.state == ParseState::PreHeader {
            warn!("drill file has no M48 header");
        }
        Ok(DrillLayer::new(
            self.plated.into_additive(),
            self.non_plated.into_additive(),
            self.minimum_diameter,
        ))
    }
}

pub fn interpret(content: &str, options: &ParseOptions) -> Result<DrillLayer, FabError> {
    let mut settings = ExcellonSettings::new(options);
    for line in content.lines() {
        let flow = settings
            .process_line(line)
            .map_err(|e| e.in_command(line.trim()))?;
        if flow == Flow::Stop {
            debug!("end of program");
            break;
        }
    }
    settings.finish()
}
