pub mod commands;
pub mod interpreter;
pub mod lexer;
pub mod macros;

use log::debug;

use crate::error::FabError;
use crate::geometry::{signed_area, Paths};
use crate::options::ParseOptions;

/// Final geometry of one Gerber file, in millimeters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GerberImage {
    image: Paths,
    minimum_thickness: Option<f64>,
}

impl GerberImage {
    pub fn new(image: Paths, minimum_thickness: Option<f64>) -> Self {
        Self {
            image,
            minimum_thickness,
        }
    }

    /// The polygon set. An outline layer is usually drawn as a stroke around
    /// the board edge, so `is_outline` drops the single largest contour to
    /// leave the board interior.
    pub fn result(&self, is_outline: bool) -> Paths {
        let mut paths = self.image.clone();
        if is_outline {
            let largest = paths
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| signed_area(a).abs().total_cmp(&signed_area(b).abs()))
                .map(|(index, _)| index);
            if let Some(index) = largest {
                paths.remove(index);
            }
        }
        paths
    }

    /// Smallest width of any dark stroke drawn with a plain round aperture.
    pub fn minimum_thickness(&self) -> Option<f64> {
        self.minimum_thickness
    }
}

/// Parse a complete Gerber file.
pub fn parse_gerber(content: &str, options: &ParseOptions) -> Result<GerberImage, FabError> {
    let tokens = lexer::tokenize(content);
    debug!("gerber: {} tokens", tokens.len());
    interpreter::interpret(&tokens, options)
}
