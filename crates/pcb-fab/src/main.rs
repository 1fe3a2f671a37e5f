use clap::{Parser, ValueEnum};
use pcb_fab::error::FabError;
use pcb_fab::options::ParseOptions;
use pcb_fab::output::LayerOutput;
use pcb_fab::{detect_kind, parse, FileKind};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Gerber,
    Excellon,
}

impl From<KindArg> for FileKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Gerber => FileKind::Gerber,
            KindArg::Excellon => FileKind::Excellon,
        }
    }
}

#[derive(Parser)]
#[command(name = "pcb-fab", about = "Convert Gerber and Excellon files to polygon JSON")]
struct Cli {
    /// Input Gerber (.gbr, .gtl, ...) or Excellon (.drl, .xln, .txt, .exc) file
    input: PathBuf,

    /// Output JSON file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the kind inferred from the file extension
    #[arg(short, long, value_enum)]
    kind: Option<KindArg>,

    /// Treat the Gerber file as a board outline and drop its outer contour
    #[arg(long)]
    outline: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Maximum chord deviation when flattening arcs, in millimeters
    #[arg(long)]
    tolerance: Option<f64>,

    /// Minimum number of segments in a flattened circle
    #[arg(long)]
    min_segments: Option<usize>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), FabError> {
    let mut opts = ParseOptions::default();
    if let Some(tolerance) = cli.tolerance {
        if !(tolerance > 0.0) {
            return Err(FabError::Format("--tolerance must be positive".into()));
        }
        opts.arc_tolerance = tolerance;
    }
    if let Some(segments) = cli.min_segments {
        opts.min_circle_segments = segments;
    }

    let kind = cli
        .kind
        .map(FileKind::from)
        .unwrap_or_else(|| detect_kind(&cli.input));

    let content = std::fs::read_to_string(&cli.input)?;
    let parsed = parse(&content, kind, &opts)?;

    let output = LayerOutput::from_parsed(&parsed, cli.outline);
    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };

    if let Some(output_path) = &cli.output {
        std::fs::write(output_path, &json)?;
        eprintln!("Written to {}", output_path.display());
    } else {
        println!("{json}");
    }
    Ok(())
}
