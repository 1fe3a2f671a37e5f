use serde::ser::Serializer;
use serde::Serialize;

use crate::geometry::{net_area, Paths};
use crate::ParsedFile;

pub fn round_f64(v: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (v * factor).round() / factor
}

fn serialize_paths_rounded<S: Serializer>(paths: &Paths, s: S) -> Result<S::Ok, S::Error> {
    let rounded: Vec<Vec<[f64; 2]>> = paths
        .iter()
        .map(|path| {
            path.iter()
                .map(|p| [round_f64(p[0], 6), round_f64(p[1], 6)])
                .collect()
        })
        .collect();
    rounded.serialize(s)
}

fn serialize_opt_f64_rounded<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(val) => s.serialize_some(&round_f64(*val, 6)),
        None => s.serialize_none(),
    }
}

fn serialize_f64_rounded<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round_f64(*v, 6))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Gerber,
    Excellon,
}

/// JSON document written by the command line tool.
#[derive(Debug, Clone, Serialize)]
pub struct LayerOutput {
    pub kind: LayerKind,
    /// Contours in millimeters; counter-clockwise outlines, clockwise holes.
    #[serde(serialize_with = "serialize_paths_rounded")]
    pub polygons: Paths,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub area: f64,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_f64_rounded"
    )]
    pub minimum_thickness: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_f64_rounded"
    )]
    pub minimum_diameter: Option<f64>,
}

impl LayerOutput {
    /// `is_outline` only affects Gerber input.
    pub fn from_parsed(parsed: &ParsedFile, is_outline: bool) -> Self {
        let (kind, polygons, minimum_thickness, minimum_diameter) = match parsed {
            ParsedFile::Gerber(image) => (
                LayerKind::Gerber,
                image.result(is_outline),
                image.minimum_thickness(),
                None,
            ),
            ParsedFile::Excellon(drills) => (
                LayerKind::Excellon,
                drills.layer(),
                None,
                drills.minimum_diameter(),
            ),
        };
        Self {
            kind,
            area: net_area(&polygons).abs(),
            polygons,
            minimum_thickness,
            minimum_diameter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::gerber::GerberImage;

    #[test]
    fn test_round_f64() {
        assert_eq!(round_f64(1.23456789, 6), 1.234568);
        assert_eq!(round_f64(-0.0000004, 6), -0.0);
    }

    #[test]
    fn test_serialize_gerber_layer() {
        let square = vec![vec![
            [0.0, 0.0],
            [1.0000001, 0.0],
            [1.0000001, 1.0],
            [0.0, 1.0],
        ]];
        let parsed = ParsedFile::Gerber(GerberImage::new(square, Some(0.15)));
        let output = LayerOutput::from_parsed(&parsed, false);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "gerber");
        assert_eq!(json["polygons"][0][1][0], 1.0);
        assert_eq!(json["minimum_thickness"], 0.15);
        assert!(json.get("minimum_diameter").is_none());
        assert!((json["area"].as_f64().unwrap() - 1.0).abs() < 1e-6);
    }
}
