pub mod aperture;
pub mod dispatch;
pub mod error;
pub mod expression;
pub mod format;
pub mod geometry;
pub mod options;
pub mod output;
pub mod parsers;

use error::FabError;
use log::debug;
use options::ParseOptions;
use parsers::excellon::DrillLayer;
use parsers::gerber::GerberImage;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Gerber,
    Excellon,
}

/// A parsed fabrication file of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFile {
    Gerber(GerberImage),
    Excellon(DrillLayer),
}

/// Detect the file kind from the extension. Anything not recognized as a
/// drill file is treated as Gerber.
pub fn detect_kind(path: &Path) -> FileKind {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("drl") | Some("xln") | Some("txt") | Some("exc") => FileKind::Excellon,
        _ => FileKind::Gerber,
    }
}

/// Parse file content of a known kind.
pub fn parse(content: &str, kind: FileKind, opts: &ParseOptions) -> Result<ParsedFile, FabError> {
    debug!("parsing {} bytes as {kind:?}", content.len());
    match kind {
        FileKind::Gerber => parsers::gerber::parse_gerber(content, opts).map(ParsedFile::Gerber),
        FileKind::Excellon => {
            parsers::excellon::parse_excellon(content, opts).map(ParsedFile::Excellon)
        }
    }
}

/// Read and parse a file, detecting its kind from the extension.
pub fn parse_file(path: &Path, opts: &ParseOptions) -> Result<ParsedFile, FabError> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, detect_kind(path), opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(Path::new("board-PTH.drl")), FileKind::Excellon);
        assert_eq!(detect_kind(Path::new("board.XLN")), FileKind::Excellon);
        assert_eq!(detect_kind(Path::new("drill.txt")), FileKind::Excellon);
        assert_eq!(detect_kind(Path::new("board-F_Cu.gbr")), FileKind::Gerber);
        assert_eq!(detect_kind(Path::new("board.GTL")), FileKind::Gerber);
        assert_eq!(detect_kind(Path::new("noext")), FileKind::Gerber);
    }

    #[test]
    fn test_parse_dispatches_on_kind() {
        let opts = ParseOptions::default();
        let gerber = parse("%FSLAX24Y24*%\n%MOMM*%\nM02*\n", FileKind::Gerber, &opts).unwrap();
        assert!(matches!(gerber, ParsedFile::Gerber(_)));
        let drills = parse("M48\nMETRIC\n%\nM30\n", FileKind::Excellon, &opts).unwrap();
        assert!(matches!(drills, ParsedFile::Excellon(_)));
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/nonexistent/board.gbr"), &ParseOptions::default());
        assert!(matches!(err, Err(FabError::Io(_))));
    }

    #[test]
    fn test_results_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ParsedFile>();
        assert_send::<FabError>();
    }
}
