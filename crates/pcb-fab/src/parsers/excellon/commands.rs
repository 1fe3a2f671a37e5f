//! Excellon command table and line-level parsing helpers.

use crate::dispatch::CommandTable;
use crate::error::FabError;
use crate::format::{Units, ZeroPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcellonCommand {
    /// `M48` opens the header.
    HeaderStart,
    /// `%` or `M95` closes the header.
    HeaderEnd,
    Metric,
    Inch,
    /// `M71`
    MetricMode,
    /// `M72`
    InchMode,
    /// `FMAT,n`
    FormatVersion,
    /// `ICI,ON|OFF`
    IncrementalInput,
    Comment,
    /// `Tnn` selection or `TnnC..` definition.
    Tool,
    DrillMode,
    RoutMove,
    RoutLinear,
    RoutClockwise,
    RoutCounterClockwise,
    ToolDown,
    ToolUp,
    Absolute,
    Incremental,
    EndOfProgram,
    Coordinate,
}

/// `G`/`M` codes must match their number exactly: `M30` does not claim `M300`.
pub fn claims(prefix: &str, rest: &str) -> bool {
    let numbered = prefix.len() > 1
        && prefix.starts_with(['G', 'M'])
        && prefix[1..].bytes().all(|b| b.is_ascii_digit());
    !(numbered && rest.starts_with(|c: char| c.is_ascii_digit()))
}

pub fn excellon_table() -> CommandTable<ExcellonCommand> {
    CommandTable::new()
        .with("M48", ExcellonCommand::HeaderStart)
        .with("%", ExcellonCommand::HeaderEnd)
        .with("M95", ExcellonCommand::HeaderEnd)
        .with("METRIC", ExcellonCommand::Metric)
        .with("INCH", ExcellonCommand::Inch)
        .with("M71", ExcellonCommand::MetricMode)
        .with("M72", ExcellonCommand::InchMode)
        .with("FMAT", ExcellonCommand::FormatVersion)
        .with("ICI", ExcellonCommand::IncrementalInput)
        .with(";", ExcellonCommand::Comment)
        .with("T", ExcellonCommand::Tool)
        .with("G05", ExcellonCommand::DrillMode)
        .with("G00", ExcellonCommand::RoutMove)
        .with("G01", ExcellonCommand::RoutLinear)
        .with("G02", ExcellonCommand::RoutClockwise)
        .with("G03", ExcellonCommand::RoutCounterClockwise)
        .with("M15", ExcellonCommand::ToolDown)
        .with("M16", ExcellonCommand::ToolUp)
        .with("M17", ExcellonCommand::ToolUp)
        .with("G90", ExcellonCommand::Absolute)
        .with("G91", ExcellonCommand::Incremental)
        .with("M30", ExcellonCommand::EndOfProgram)
        .with("M00", ExcellonCommand::EndOfProgram)
        .with("X", ExcellonCommand::Coordinate)
        .with("Y", ExcellonCommand::Coordinate)
}

/// Options of a `METRIC`/`INCH` header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitsLine {
    pub units: Units,
    pub zeros: Option<ZeroPolicy>,
    /// Explicit `000.000` style digit widths.
    pub digits: Option<(u8, u8)>,
}

/// Parse `METRIC,TZ,000.000`, `INCH,LZ` and friends.
pub fn parse_units_line(units: Units, line: &str) -> Result<UnitsLine, FabError> {
    let mut out = UnitsLine {
        units,
        zeros: None,
        digits: None,
    };
    for part in line.split(',').skip(1) {
        let part = part.trim();
        match part {
            // Trailing zeros kept, so the leading ones were dropped.
            "TZ" => out.zeros = Some(ZeroPolicy::PadLeft),
            "LZ" => out.zeros = Some(ZeroPolicy::PadRight),
            "" => {}
            _ if part.bytes().all(|b| b == b'0' || b == b'.') => {
                let (int, dec) = part
                    .split_once('.')
                    .ok_or_else(|| FabError::Format(format!("bad number format {part:?}")))?;
                if int.is_empty() || dec.is_empty() || dec.contains('.') {
                    return Err(FabError::Format(format!("bad number format {part:?}")));
                }
                out.digits = Some((int.len() as u8, dec.len() as u8));
            }
            other => {
                return Err(FabError::Format(format!("unknown units option {other:?}")))
            }
        }
    }
    Ok(out)
}

/// Default digit widths when a file names its units but no format.
pub fn default_digits(units: Units) -> (u8, u8) {
    match units {
        Units::Millimeters => (3, 3),
        Units::Inches => (2, 4),
    }
}

/// `Tnn[F..][S..]C<diameter>`, with the diameter still in file units.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolWord {
    pub number: u32,
    pub diameter: Option<f64>,
}

pub fn parse_tool(line: &str) -> Result<ToolWord, FabError> {
    let rest = &line[1..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let number = rest[..end]
        .parse()
        .map_err(|_| FabError::Format(format!("bad tool number in {line}")))?;

    let mut diameter = None;
    for (letter, value) in address_words(&rest[end..])? {
        let value: f64 = value
            .parse()
            .map_err(|_| FabError::Format(format!("bad {letter} value in {line}")))?;
        if letter == 'C' {
            if !(value.is_finite() && value >= 0.0) {
                return Err(FabError::Format(format!("bad tool diameter in {line}")));
            }
            diameter = Some(value);
        }
    }
    Ok(ToolWord { number, diameter })
}

/// Raw address words of a body coordinate line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateLine<'a> {
    pub x: Option<&'a str>,
    pub y: Option<&'a str>,
    pub i: Option<&'a str>,
    pub j: Option<&'a str>,
    /// Arc radius.
    pub a: Option<&'a str>,
}

impl CoordinateLine<'_> {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }
}

pub fn parse_coordinates(line: &str) -> Result<CoordinateLine<'_>, FabError> {
    let mut out = CoordinateLine::default();
    for (letter, value) in address_words(line)? {
        match letter {
            'X' => out.x = Some(value),
            'Y' => out.y = Some(value),
            'I' => out.i = Some(value),
            'J' => out.j = Some(value),
            'A' => out.a = Some(value),
            other => {
                return Err(FabError::Format(format!(
                    "unexpected {other:?} in coordinates {line}"
                )))
            }
        }
    }
    Ok(out)
}

/// Split `G85` slot syntax, `X1Y1G85X2Y2`, into its two coordinate halves.
pub fn split_slot(line: &str) -> Option<(&str, &str)> {
    line.split_once("G85")
}

/// Letter/number pairs such as `X1.5Y-2` or `F200S65C0.8`.
fn address_words(s: &str) -> Result<Vec<(char, &str)>, FabError> {
    let mut words = Vec::new();
    let bytes = s.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let letter = bytes[pos] as char;
        if !letter.is_ascii_alphabetic() {
            return Err(FabError::Format(format!("expected a letter in {s:?}")));
        }
        pos += 1;
        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let value = s[start..pos].trim();
        if value.is_empty() {
            return Err(FabError::Format(format!("{letter} without a value in {s:?}")));
        }
        words.push((letter, value));
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_line() {
        let line = parse_units_line(Units::Millimeters, "METRIC,TZ,000.000").unwrap();
        assert_eq!(line.zeros, Some(ZeroPolicy::PadLeft));
        assert_eq!(line.digits, Some((3, 3)));

        let line = parse_units_line(Units::Inches, "INCH,LZ").unwrap();
        assert_eq!(line.units, Units::Inches);
        assert_eq!(line.zeros, Some(ZeroPolicy::PadRight));
        assert_eq!(line.digits, None);

        let line = parse_units_line(Units::Millimeters, "METRIC,0000.00").unwrap();
        assert_eq!(line.digits, Some((4, 2)));
        assert_eq!(line.zeros, None);

        assert!(parse_units_line(Units::Inches, "INCH,XZ").is_err());
        assert!(parse_units_line(Units::Inches, "INCH,000").is_err());
    }

    #[test]
    fn test_tool_definition() {
        assert_eq!(
            parse_tool("T01C0.300").unwrap(),
            ToolWord {
                number: 1,
                diameter: Some(0.3)
            }
        );
        assert_eq!(
            parse_tool("T3F200S65C1.0").unwrap(),
            ToolWord {
                number: 3,
                diameter: Some(1.0)
            }
        );
        assert_eq!(parse_tool("T12").unwrap().diameter, None);
        assert_eq!(parse_tool("T0").unwrap().number, 0);
        assert!(parse_tool("TC1.0").is_err());
        assert!(parse_tool("T1C").is_err());
        assert!(parse_tool("T1C-1").is_err());
    }

    #[test]
    fn test_coordinates() {
        let line = parse_coordinates("X1.5Y-2.25").unwrap();
        assert_eq!(line.x, Some("1.5"));
        assert_eq!(line.y, Some("-2.25"));
        assert!(!line.is_empty());

        let line = parse_coordinates("X010000Y005000A2.5").unwrap();
        assert_eq!(line.a, Some("2.5"));
        assert!(parse_coordinates("X1Z2").is_err());
        assert!(parse_coordinates("XY2").is_err());
        assert!(parse_coordinates("").unwrap().is_empty());
    }

    #[test]
    fn test_split_slot() {
        assert_eq!(split_slot("X1Y2G85X3Y2"), Some(("X1Y2", "X3Y2")));
        assert_eq!(split_slot("X1Y2"), None);
    }

    #[test]
    fn test_table() {
        let table = excellon_table();
        assert_eq!(table.resolve("M48").map(|r| r.1), Some(ExcellonCommand::HeaderStart));
        assert_eq!(table.resolve("METRIC,TZ").map(|r| r.1), Some(ExcellonCommand::Metric));
        assert_eq!(table.resolve("M95").map(|r| r.1), Some(ExcellonCommand::HeaderEnd));
        assert_eq!(table.resolve("T01C0.3").map(|r| r.1), Some(ExcellonCommand::Tool));
        assert_eq!(table.resolve("G01X1Y1").map(|r| r.1), Some(ExcellonCommand::RoutLinear));
        assert_eq!(table.resolve("VER,1"), None);
        assert!(claims("M30", ""));
        assert!(!claims("M30", "0"));
        assert!(claims("G01", "X1Y1"));
        assert!(claims("METRIC", ",TZ"));
        assert!(claims("T", "01C0.3"));
    }
}
