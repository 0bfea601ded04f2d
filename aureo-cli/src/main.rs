//! Aureo CLI - golden-spiral authenticity seals for images.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

/// Serialization format of the seal receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Cbor,
}

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments)
  65  No seal found or verification failed
  66  Cannot read input file
  74  Cannot write output file
  75  Detection inconclusive (timed out)";

#[derive(Parser)]
#[command(name = "aureo")]
#[command(author, version, about = "Golden-spiral authenticity seals for images", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed an authenticity seal into a PNG or JPEG image
    Seal {
        /// Path to the image to seal
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Author identifier recorded with the seal
        #[arg(short, long)]
        author: String,

        /// Sealed image path (defaults to <stem>.sealed.<ext>)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Horizontal seal centre as a fraction of the width
        #[arg(long, value_name = "F")]
        anchor_x: Option<f64>,

        /// Vertical seal centre as a fraction of the height
        #[arg(long, value_name = "F")]
        anchor_y: Option<f64>,

        /// Receipt format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Show what would be written without sealing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Look for seals in one or more images
    Detect {
        /// Images to scan
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Per-image detection budget in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 2000)]
        timeout_ms: u64,
    },

    /// Verify a sealed image against its receipt
    Verify {
        /// Path to the sealed image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to the receipt (defaults to <FILE>.aureo)
        #[arg(value_name = "RECEIPT")]
        receipt: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Seal {
            file,
            author,
            output,
            anchor_x,
            anchor_y,
            format,
            dry_run,
        } => commands::seal::execute(
            commands::seal::SealArgs {
                file,
                author,
                output,
                anchor_x,
                anchor_y,
                format,
                dry_run,
            },
            quiet,
        ),
        Commands::Detect {
            files,
            json,
            timeout_ms,
        } => commands::detect::execute(files, json, timeout_ms, quiet),
        Commands::Verify { file, receipt } => commands::verify::execute(file, receipt, quiet),
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &outcome.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    outcome.into()
}
