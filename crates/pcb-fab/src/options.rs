use serde::Deserialize;

/// Tuning knobs shared by the Gerber and Excellon interpreters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Maximum chord deviation (sagitta) allowed when flattening arcs and
    /// circles, in millimeters.
    pub arc_tolerance: f64,
    /// Lower bound on the vertex count of a flattened full circle.
    pub min_circle_segments: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            arc_tolerance: 0.002,
            min_circle_segments: 16,
        }
    }
}
