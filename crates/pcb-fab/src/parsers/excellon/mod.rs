pub mod commands;
pub mod interpreter;

use crate::error::FabError;
use crate::geometry::kernel;
use crate::geometry::{reverse_paths, Paths};
use crate::options::ParseOptions;

/// Hole geometry of one drill file, in millimeters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillLayer {
    plated: Paths,
    non_plated: Paths,
    minimum_diameter: Option<f64>,
}

impl DrillLayer {
    pub fn new(plated: Paths, non_plated: Paths, minimum_diameter: Option<f64>) -> Self {
        Self {
            plated,
            non_plated,
            minimum_diameter,
        }
    }

    /// All holes as one set, wound clockwise so that they subtract when
    /// combined with board geometry.
    pub fn layer(&self) -> Paths {
        let mut holes = kernel::union(&self.plated, &self.non_plated);
        reverse_paths(&mut holes);
        holes
    }

    pub fn plated(&self) -> &Paths {
        &self.plated
    }

    pub fn non_plated(&self) -> &Paths {
        &self.non_plated
    }

    /// Smallest tool that made a hit or routed a path.
    pub fn minimum_diameter(&self) -> Option<f64> {
        self.minimum_diameter
    }
}

/// Parse a complete Excellon drill file.
pub fn parse_excellon(content: &str, options: &ParseOptions) -> Result<DrillLayer, FabError> {
    interpreter::interpret(content, options)
}
