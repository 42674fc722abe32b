use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hitcov::cli::{self, InputArgs, SummaryFormat};

/// Turn instruction hit records into a Cobertura coverage report.
#[derive(Parser)]
#[command(name = "hitcov", version, about)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Path to the hit-record file.
    hits: PathBuf,

    /// Record layout (assembly, legacy). Detected when omitted.
    #[arg(long)]
    layout: Option<String>,

    /// Prefix stripped from source paths (default: current directory).
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Do not fill gaps between recorded lines.
    #[arg(long)]
    no_interpolate: bool,
}

impl Input {
    fn args(&self) -> InputArgs<'_> {
        InputArgs {
            layout: self.layout.as_deref(),
            source_root: self.source_root.as_deref(),
            no_interpolate: self.no_interpolate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a Cobertura XML report.
    Report {
        #[command(flatten)]
        input: Input,

        /// Where to write the report.
        #[arg(short, long, default_value = "coverage.xml")]
        output: PathBuf,
    },

    /// Print per-method coverage.
    Summary {
        #[command(flatten)]
        input: Input,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: SummaryFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let app = Cli::parse();
    init_tracing(app.verbose);

    let output = match &app.command {
        Commands::Report { input, output } => cli::cmd_report(&input.hits, output, &input.args())?,
        Commands::Summary { input, format } => cli::cmd_summary(&input.hits, *format, &input.args())?,
    };
    print!("{output}");
    Ok(())
}
