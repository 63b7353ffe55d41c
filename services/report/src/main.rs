//! QoS report command line tool.
//!
//! Computes per-minute stream concurrency and estimated downstream
//! bandwidth over a set of QoS dumps, writes a CSV report, and plots the
//! hourly peak series as terminal bar charts.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use clap::{CommandFactory, Parser};
use qos_report::{chart, qos, report, window};
use qos_report::{AnalysisWindow, ChartGeometry, ReportConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Report stream concurrency and bandwidth from QoS dumps.
#[derive(Debug, Parser)]
#[command(name = "qos-report", version, about)]
struct Cli {
    /// QoS dump files to analyze.
    #[arg(long = "file", value_name = "FILE", value_delimiter = ',')]
    file: Vec<PathBuf>,

    /// Window begin, `YYYY-MM-DD` or RFC 3339; default is the observed extent.
    #[arg(long, value_name = "WHEN")]
    from: Option<String>,

    /// Window end, `YYYY-MM-DD` or RFC 3339; default is the observed extent.
    #[arg(long, value_name = "WHEN")]
    to: Option<String>,

    /// CSV destination; overrides the configured path.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Skip terminal charts.
    #[arg(long)]
    no_chart: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ReportConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging.level);

    info!(
        service = "qos-report",
        version = env!("CARGO_PKG_VERSION"),
        "Starting QoS report"
    );

    if let Some(output) = cli.output.clone() {
        config.output.csv_path = output;
    }
    config.validate().context("Invalid configuration")?;

    if cli.file.is_empty() {
        Cli::command()
            .print_help()
            .context("Failed to print usage")?;
        println!();
        return Ok(());
    }

    let from = parse_instant(cli.from.as_deref()).context("Invalid --from")?;
    let to = parse_instant(cli.to.as_deref()).context("Invalid --to")?;

    let streams = qos::load_streams(&cli.file)?;
    let summary = qos::summarize(&streams);
    info!(streams = summary.streams, files = cli.file.len(), "loaded dumps");
    if let (Some(first), Some(last)) = (summary.first_begin, summary.last_end) {
        info!(
            first = %report::format_bucket_date(first),
            last = %report::format_bucket_date(last),
            longest_minutes = summary.longest_ms / 60_000,
            "observed stream extent"
        );
    }
    info!(
        rtc_instances = summary.rtc_instances,
        max_streams_per_instance = summary.max_streams_per_instance,
        "instance spread"
    );

    let window = AnalysisWindow::resolve(&streams, from, to)?;
    info!(
        begin = window.begin,
        end = window.end,
        samples = window.samples(),
        hours = window.hours(),
        "resolved analysis window"
    );

    let sampled = window::sample(&streams, &window)?;
    report::write_csv(&config.output.csv_path, &sampled.samples)
        .context("Failed to write CSV report")?;
    info!(
        path = %config.output.csv_path.display(),
        rows = sampled.samples.len(),
        "wrote report"
    );

    if config.chart.enabled && !cli.no_chart {
        let geometry = ChartGeometry {
            width: config.chart.width,
            height: config.chart.height,
        };
        println!(
            "{}",
            chart::render("Peak Concurrent Audio Streams", &sampled.peaks.audio, &geometry)
        );
        println!(
            "{}",
            chart::render("Peak Concurrent Video Streams", &sampled.peaks.video, &geometry)
        );
        println!(
            "{}",
            chart::render(
                "Peak Concurrent ScreenShare Streams",
                &sampled.peaks.screen_share,
                &geometry
            )
        );
        println!(
            "{}",
            chart::render(
                "Estimated Average Downstream Bandwidth [Mbps]",
                &sampled.peaks.bandwidth,
                &geometry
            )
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

/// Parse `YYYY-MM-DD` (UTC midnight) or a full RFC 3339 timestamp into
/// epoch milliseconds.
fn parse_instant(raw: Option<&str>) -> Result<Option<i64>> {
    let raw = match raw {
        Some(raw) => raw,
        None => return Ok(None),
    };
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).context("invalid date")?;
        return Ok(Some(midnight.and_utc().timestamp_millis()));
    }
    let instant = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("'{raw}' is neither YYYY-MM-DD nor RFC 3339"))?;
    Ok(Some(instant.timestamp_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_instant_date_is_utc_midnight() {
        let ms = parse_instant(Some("2017-08-02")).unwrap().unwrap();
        assert_eq!(ms, 1_501_632_000_000);
    }

    #[test]
    fn test_parse_instant_rfc3339() {
        let ms = parse_instant(Some("2017-08-02T14:03:22Z")).unwrap().unwrap();
        assert_eq!(ms, 1_501_682_602_000);
    }

    #[test]
    fn test_parse_instant_absent_and_garbage() {
        assert_eq!(parse_instant(None).unwrap(), None);
        assert!(parse_instant(Some("last tuesday")).is_err());
    }
}
