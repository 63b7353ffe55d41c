//! Day-by-day dump splitter.
//!
//! Search exports sometimes concatenate several days of results into one
//! text file, each day introduced by a `YYYY-MM-DD` marker line followed by
//! a separator line. This tool cuts such a file into per-day JSON dumps the
//! import and report services can consume directly.

mod splitter;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use splitter::DaySplitter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Split concatenated day-by-day dumps into one file per day.
#[derive(Debug, Parser)]
#[command(name = "qos-split", version, about)]
struct Cli {
    /// Input files to split.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Directory for the day files; default is next to each input.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info");

    if cli.files.is_empty() {
        Cli::command()
            .print_help()
            .context("Failed to print usage")?;
        println!();
        return Ok(());
    }

    let splitter = DaySplitter::new(cli.out_dir.clone()).context("Failed to build splitter")?;
    for file in &cli.files {
        let stats = splitter
            .split_file(file)
            .with_context(|| format!("Failed to split {}", file.display()))?;
        info!(
            file = %file.display(),
            days = stats.days,
            lines = stats.lines,
            skipped = stats.skipped,
            "split input"
        );
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}
