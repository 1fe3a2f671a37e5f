//! Gerber command tables and the lexical parsing of individual statements.
//!
//! Extended (`%...%`) statements and word statements are resolved through
//! separate tables, so an extended code such as `IP` is never confused with a
//! coordinate word starting with `I`.

use crate::aperture::ShapeKind;
use crate::dispatch::CommandTable;
use crate::error::FabError;
use crate::format::ZeroPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedCommand {
    /// `%FS` coordinate format.
    FormatSpec,
    /// `%MO` units.
    Units,
    /// `%AD` aperture definition.
    ApertureDefine,
    /// `%AM` aperture macro.
    ApertureMacro,
    /// `%AB` block aperture open/close.
    ApertureBlock,
    /// `%LP` polarity.
    LoadPolarity,
    /// `%LM` mirroring.
    LoadMirroring,
    /// `%LR` rotation.
    LoadRotation,
    /// `%LS` scaling.
    LoadScaling,
    /// `%SR` step-and-repeat, recognized only to warn about it.
    StepRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCommand {
    Linear,
    Clockwise,
    CounterClockwise,
    RegionOpen,
    RegionClose,
    SingleQuadrant,
    MultiQuadrant,
    Inches,
    Millimeters,
    Absolute,
    Incremental,
    /// `G54`/`G55`: legacy prefixes to aperture selection and flashes.
    LegacyPrefix,
    EndOfFile,
    /// `Dnn` on its own.
    DCode,
    /// Coordinate data with an optional trailing D code.
    Coordinate,
}

impl WordCommand {
    /// Codes made of a letter and a number must match that number exactly:
    /// `G1` must not claim `G10`.
    pub fn is_numbered_code(self) -> bool {
        !matches!(self, WordCommand::DCode | WordCommand::Coordinate)
    }
}

pub fn extended_table() -> CommandTable<ExtendedCommand> {
    CommandTable::new()
        .with("FS", ExtendedCommand::FormatSpec)
        .with("MO", ExtendedCommand::Units)
        .with("AD", ExtendedCommand::ApertureDefine)
        .with("AM", ExtendedCommand::ApertureMacro)
        .with("AB", ExtendedCommand::ApertureBlock)
        .with("LP", ExtendedCommand::LoadPolarity)
        .with("LM", ExtendedCommand::LoadMirroring)
        .with("LR", ExtendedCommand::LoadRotation)
        .with("LS", ExtendedCommand::LoadScaling)
        .with("SR", ExtendedCommand::StepRepeat)
}

pub fn word_table() -> CommandTable<WordCommand> {
    CommandTable::new()
        .with("G01", WordCommand::Linear)
        .with("G1", WordCommand::Linear)
        .with("G02", WordCommand::Clockwise)
        .with("G2", WordCommand::Clockwise)
        .with("G03", WordCommand::CounterClockwise)
        .with("G3", WordCommand::CounterClockwise)
        .with("G36", WordCommand::RegionOpen)
        .with("G37", WordCommand::RegionClose)
        .with("G74", WordCommand::SingleQuadrant)
        .with("G75", WordCommand::MultiQuadrant)
        .with("G70", WordCommand::Inches)
        .with("G71", WordCommand::Millimeters)
        .with("G90", WordCommand::Absolute)
        .with("G91", WordCommand::Incremental)
        .with("G54", WordCommand::LegacyPrefix)
        .with("G55", WordCommand::LegacyPrefix)
        .with("M02", WordCommand::EndOfFile)
        .with("M2", WordCommand::EndOfFile)
        .with("M00", WordCommand::EndOfFile)
        .with("M0", WordCommand::EndOfFile)
        .with("D", WordCommand::DCode)
        .with("X", WordCommand::Coordinate)
        .with("Y", WordCommand::Coordinate)
        .with("I", WordCommand::Coordinate)
        .with("J", WordCommand::Coordinate)
}

/// Contents of a `%FS` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub zeros: ZeroPolicy,
    pub integer_digits: u8,
    pub decimal_digits: u8,
}

/// Parse `FSLAX24Y24` and friends.
pub fn parse_format_spec(statement: &str) -> Result<FormatSpec, FabError> {
    let s = &statement[2..];
    let x_pos = s
        .find('X')
        .ok_or_else(|| FabError::Format("FS: missing X".into()))?;
    let y_pos = s
        .find('Y')
        .ok_or_else(|| FabError::Format("FS: missing Y".into()))?;
    if y_pos < x_pos {
        return Err(FabError::Format(format!("FS: Y before X in {statement}")));
    }

    let mut zeros = ZeroPolicy::PadLeft;
    for flag in s[..x_pos].chars() {
        match flag {
            'L' => zeros = ZeroPolicy::PadLeft,
            'T' => zeros = ZeroPolicy::PadRight,
            'A' => {}
            'I' => {
                return Err(FabError::UnsupportedFeature(
                    "incremental coordinates".into(),
                ))
            }
            _ => {}
        }
    }

    let x = digit_pair(&s[x_pos + 1..y_pos], statement)?;
    let y = digit_pair(&s[y_pos + 1..], statement)?;
    if x != y {
        return Err(FabError::UnsupportedFeature(format!(
            "different X and Y formats in {statement}"
        )));
    }
    Ok(FormatSpec {
        zeros,
        integer_digits: x.0,
        decimal_digits: x.1,
    })
}

fn digit_pair(part: &str, statement: &str) -> Result<(u8, u8), FabError> {
    let bad = || FabError::Format(format!("FS: invalid digits in {statement}"));
    let part = part.trim();
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let integer = part[..1].parse().map_err(|_| bad())?;
    let decimal = part[1..].parse().map_err(|_| bad())?;
    Ok((integer, decimal))
}

/// Template part of an `%AD` statement, before unit conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ApertureTemplate {
    Standard {
        kind: ShapeKind,
        hole: Option<f64>,
    },
    Macro {
        name: String,
        params: Vec<f64>,
    },
}

/// Parse `ADD10C,0.020` or `ADD22OC8,0.1` into the aperture code and its
/// template. Dimensions stay in file units.
pub fn parse_aperture_define(statement: &str) -> Result<(u32, ApertureTemplate), FabError> {
    let s = statement[2..]
        .strip_prefix('D')
        .ok_or_else(|| FabError::Format(format!("AD: expected D in {statement}")))?;
    let type_pos = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| FabError::Format(format!("AD: no template in {statement}")))?;
    let code: u32 = s[..type_pos]
        .parse()
        .map_err(|_| FabError::Format(format!("AD: bad aperture code in {statement}")))?;
    if code < 10 {
        return Err(FabError::Format(format!(
            "AD: aperture code D{code} is reserved"
        )));
    }

    let rest = &s[type_pos..];
    let (name, params_str) = match rest.find(',') {
        Some(comma) => (&rest[..comma], &rest[comma + 1..]),
        None => (rest, ""),
    };
    let params: Vec<f64> = if params_str.trim().is_empty() {
        Vec::new()
    } else {
        params_str
            .split('X')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|_| FabError::Format(format!("AD: bad parameter {p:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let template = match name {
        "C" => {
            let params = params_within(&params, 1, 2, statement)?;
            ApertureTemplate::Standard {
                kind: ShapeKind::Circle {
                    diameter: params[0],
                },
                hole: params.get(1).copied(),
            }
        }
        "R" | "O" => {
            let params = params_within(&params, 2, 3, statement)?;
            let (width, height) = (params[0], params[1]);
            let kind = if name == "R" {
                ShapeKind::Rectangle { width, height }
            } else {
                ShapeKind::Obround { width, height }
            };
            ApertureTemplate::Standard {
                kind,
                hole: params.get(2).copied(),
            }
        }
        "P" => {
            let params = params_within(&params, 2, 4, statement)?;
            let vertices = params[1];
            if vertices.fract() != 0.0 || vertices < 0.0 {
                return Err(FabError::Format(format!(
                    "AD: polygon vertex count {vertices} is not a whole number"
                )));
            }
            ApertureTemplate::Standard {
                kind: ShapeKind::Polygon {
                    diameter: params[0],
                    vertices: vertices as u32,
                    rotation: params.get(2).copied().unwrap_or(0.0),
                },
                hole: params.get(3).copied(),
            }
        }
        "" => return Err(FabError::Format(format!("AD: no template in {statement}"))),
        macro_name => ApertureTemplate::Macro {
            name: macro_name.to_string(),
            params,
        },
    };
    Ok((code, template))
}

fn params_within<'a>(
    params: &'a [f64],
    min: usize,
    max: usize,
    statement: &str,
) -> Result<&'a [f64], FabError> {
    if (min..=max).contains(&params.len()) {
        Ok(params)
    } else {
        Err(FabError::Format(format!(
            "AD: expected {min} to {max} parameters in {statement}"
        )))
    }
}

/// Operation code of a coordinate statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// D01
    Interpolate,
    /// D02
    Move,
    /// D03
    Flash,
}

/// What a D code on its own, or at the end of a coordinate word, means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DCode {
    Operation(Operation),
    Select(u32),
}

pub fn parse_d_code(digits: &str) -> Result<DCode, FabError> {
    let code: u32 = digits
        .parse()
        .map_err(|_| FabError::Format(format!("bad D code D{digits}")))?;
    match code {
        1 => Ok(DCode::Operation(Operation::Interpolate)),
        2 => Ok(DCode::Operation(Operation::Move)),
        3 => Ok(DCode::Operation(Operation::Flash)),
        n if n >= 10 => Ok(DCode::Select(n)),
        n => Err(FabError::Format(format!("invalid D code D{n}"))),
    }
}

/// Raw address words of a coordinate statement, still in file notation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateWord<'a> {
    pub x: Option<&'a str>,
    pub y: Option<&'a str>,
    pub i: Option<&'a str>,
    pub j: Option<&'a str>,
    pub d: Option<Operation>,
}

/// Split `X100Y-200I50J0D01` into its address words.
pub fn parse_coordinate_word(word: &str) -> Result<CoordinateWord<'_>, FabError> {
    let mut out = CoordinateWord::default();
    let bytes = word.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let key = bytes[pos];
        if !matches!(key, b'X' | b'Y' | b'I' | b'J' | b'D') {
            let found = word[pos..].chars().next().unwrap_or('?');
            return Err(FabError::Format(format!(
                "unexpected {found:?} in coordinate word {word}"
            )));
        }
        pos += 1;
        let start = pos;
        if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            pos += 1;
        }
        while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
            pos += 1;
        }
        let value = &word[start..pos];
        if value.is_empty() {
            return Err(FabError::Format(format!("empty address in {word}")));
        }
        match key {
            b'X' => out.x = Some(value),
            b'Y' => out.y = Some(value),
            b'I' => out.i = Some(value),
            b'J' => out.j = Some(value),
            _ => match parse_d_code(value)? {
                DCode::Operation(op) => out.d = Some(op),
                DCode::Select(code) => {
                    return Err(FabError::Format(format!(
                        "aperture selection D{code} after coordinates"
                    )))
                }
            },
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_spec() {
        let fs = parse_format_spec("FSLAX24Y24").unwrap();
        assert_eq!(fs.zeros, ZeroPolicy::PadLeft);
        assert_eq!((fs.integer_digits, fs.decimal_digits), (2, 4));

        let fs = parse_format_spec("FSTAX35Y35").unwrap();
        assert_eq!(fs.zeros, ZeroPolicy::PadRight);
        assert_eq!((fs.integer_digits, fs.decimal_digits), (3, 5));
    }

    #[test]
    fn test_format_spec_rejections() {
        assert!(matches!(
            parse_format_spec("FSLIX24Y24"),
            Err(FabError::UnsupportedFeature(_))
        ));
        assert!(matches!(
            parse_format_spec("FSLAX24Y35"),
            Err(FabError::UnsupportedFeature(_))
        ));
        assert!(matches!(
            parse_format_spec("FSLAX2Y2"),
            Err(FabError::Format(_))
        ));
    }

    #[test]
    fn test_aperture_define_standard() {
        assert_eq!(
            parse_aperture_define("ADD10C,0.020").unwrap(),
            (
                10,
                ApertureTemplate::Standard {
                    kind: ShapeKind::Circle { diameter: 0.020 },
                    hole: None
                }
            )
        );
        assert_eq!(
            parse_aperture_define("ADD11R,0.040X0.020X0.01").unwrap(),
            (
                11,
                ApertureTemplate::Standard {
                    kind: ShapeKind::Rectangle {
                        width: 0.040,
                        height: 0.020
                    },
                    hole: Some(0.01)
                }
            )
        );
        assert_eq!(
            parse_aperture_define("ADD12O,0.050X0.030").unwrap().1,
            ApertureTemplate::Standard {
                kind: ShapeKind::Obround {
                    width: 0.050,
                    height: 0.030
                },
                hole: None
            }
        );
        assert_eq!(
            parse_aperture_define("ADD13P,0.080X6X45").unwrap().1,
            ApertureTemplate::Standard {
                kind: ShapeKind::Polygon {
                    diameter: 0.080,
                    vertices: 6,
                    rotation: 45.0
                },
                hole: None
            }
        );
    }

    #[test]
    fn test_aperture_define_macro_reference() {
        let (code, template) = parse_aperture_define("ADD22OC8,0.1").unwrap();
        assert_eq!(code, 22);
        assert_eq!(
            template,
            ApertureTemplate::Macro {
                name: "OC8".into(),
                params: vec![0.1]
            }
        );
        let (_, template) = parse_aperture_define("ADD23THERMAL").unwrap();
        assert_eq!(
            template,
            ApertureTemplate::Macro {
                name: "THERMAL".into(),
                params: vec![]
            }
        );
    }

    #[test]
    fn test_aperture_define_errors() {
        assert!(parse_aperture_define("ADD10C").is_err());
        assert!(parse_aperture_define("ADD10R,1").is_err());
        assert!(parse_aperture_define("ADD10C,1X2X3").is_err());
        assert!(parse_aperture_define("ADD03C,1").is_err());
        assert!(parse_aperture_define("AD10C,1").is_err());
        assert!(parse_aperture_define("ADD10C,abc").is_err());
        assert!(parse_aperture_define("ADD10P,1X5.5").is_err());
    }

    #[test]
    fn test_coordinate_word() {
        let word = parse_coordinate_word("X100Y-200I50J+0D01").unwrap();
        assert_eq!(
            word,
            CoordinateWord {
                x: Some("100"),
                y: Some("-200"),
                i: Some("50"),
                j: Some("+0"),
                d: Some(Operation::Interpolate),
            }
        );
        let word = parse_coordinate_word("Y5").unwrap();
        assert_eq!(word.x, None);
        assert_eq!(word.d, None);
        assert_eq!(parse_coordinate_word("X1D3").unwrap().d, Some(Operation::Flash));
    }

    #[test]
    fn test_coordinate_word_errors() {
        assert!(parse_coordinate_word("X100Z5D01").is_err());
        assert!(parse_coordinate_word("XD01").is_err());
        assert!(parse_coordinate_word("X1D10").is_err());
        assert!(parse_coordinate_word("X1D07").is_err());
        assert!(matches!(
            parse_coordinate_word("X1\u{e9}Y2D03"),
            Err(FabError::Format(_))
        ));
        assert!(parse_coordinate_word("\u{e9}X1").is_err());
    }

    #[test]
    fn test_d_codes() {
        assert_eq!(
            parse_d_code("02").unwrap(),
            DCode::Operation(Operation::Move)
        );
        assert_eq!(parse_d_code("10").unwrap(), DCode::Select(10));
        assert!(parse_d_code("0").is_err());
        assert!(parse_d_code("").is_err());
    }

    #[test]
    fn test_word_table_prefixes() {
        let table = word_table();
        assert_eq!(table.resolve("G01X100D01").map(|r| r.1), Some(WordCommand::Linear));
        assert_eq!(table.resolve("G36").map(|r| r.1), Some(WordCommand::RegionOpen));
        assert_eq!(table.resolve("G3").map(|r| r.1), Some(WordCommand::CounterClockwise));
        assert_eq!(table.resolve("M02").map(|r| r.1), Some(WordCommand::EndOfFile));
        assert_eq!(table.resolve("I5J5D01").map(|r| r.1), Some(WordCommand::Coordinate));
        assert_eq!(table.resolve("D11").map(|r| r.1), Some(WordCommand::DCode));
        assert_eq!(table.resolve("G04"), None);
        assert!(WordCommand::Linear.is_numbered_code());
        assert!(!WordCommand::Coordinate.is_numbered_code());
    }

    #[test]
    fn test_extended_table_is_separate() {
        let table = extended_table();
        assert_eq!(table.resolve("IPPOS"), None);
        assert_eq!(
            table.resolve("LPC").map(|r| r.1),
            Some(ExtendedCommand::LoadPolarity)
        );
        assert!(word_table().resolve("IPPOS").is_some());
    }
}
