//! QoS import command line tool.
//!
//! Reads QoS and session dumps plus load-test logs and imports them into a
//! local SQLite database. Input files are selected per record kind on the
//! command line; configuration beyond that comes from `config/` files and
//! `QOS_IMPORT_*` environment variables.

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use qos_import::store;
use qos_import::{ImportConfig, ImportSelection, Importer, SqliteStore};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Import QoS dumps and load-test logs into a local SQLite database.
#[derive(Debug, Parser)]
#[command(name = "qos-import", version, about)]
struct Cli {
    /// Client QoS dump files.
    #[arg(long, value_name = "FILE", value_delimiter = ',')]
    client_qos: Vec<PathBuf>,

    /// Server QoS dump files.
    #[arg(long, value_name = "FILE", value_delimiter = ',')]
    server_qos: Vec<PathBuf>,

    /// Session dump files; per-user rows are split out automatically.
    #[arg(long, value_name = "FILE", value_delimiter = ',')]
    session: Vec<PathBuf>,

    /// Load-test console logs.
    #[arg(long, value_name = "FILE", value_delimiter = ',')]
    loadtest: Vec<PathBuf>,

    /// Database file; overrides the configured path.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Delete the database file before importing.
    #[arg(long)]
    clean: bool,

    /// Open a sql> prompt after the import finishes.
    #[arg(long)]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ImportConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging.level);

    info!(
        service = "qos-import",
        version = env!("CARGO_PKG_VERSION"),
        "Starting QoS import"
    );

    if let Some(db) = cli.db.clone() {
        config.database.path = db;
    }
    config.validate().context("Invalid configuration")?;

    let selection = ImportSelection {
        client_qos: cli.client_qos,
        server_qos: cli.server_qos,
        session: cli.session,
        loadtest: cli.loadtest,
    };
    if selection.is_empty() {
        Cli::command()
            .print_help()
            .context("Failed to print usage")?;
        println!();
        return Ok(());
    }

    if cli.clean {
        SqliteStore::clean(&config.database.path).context("Failed to clean database")?;
        info!(path = %config.database.path.display(), "removed existing database");
    }

    let store = Arc::new(
        SqliteStore::open(&config.database.path, config.database.max_connections)
            .await
            .context("Failed to open database")?,
    );

    let importer = Importer::new(&config, Arc::clone(&store))
        .context("Failed to initialize importer")?;
    let report = match importer.run(&selection).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Import failed");
            return Err(e.into());
        }
    };

    for kind_report in &report.kinds {
        if kind_report.kind.is_qos() && kind_report.aborted.is_none() {
            let summary = store
                .qos_summary(kind_report.kind.table())
                .await
                .context("Failed to summarize imported table")?;
            info!(
                table = kind_report.kind.table(),
                rows = summary.rows,
                rtc_instances = summary.rtc_instances,
                rtc_sessions = summary.rtc_sessions,
                users = summary.users,
                error_rows = summary.error_rows,
                audio = summary.audio_active,
                video = summary.video_active,
                screen_share = summary.screen_share_active,
                "table summary"
            );
        }
    }
    info!(rows = report.total_rows(), "import complete");

    if cli.interactive {
        run_sql_prompt(store.as_ref()).await?;
    }

    let aborted = report.aborted_kinds();
    if !aborted.is_empty() {
        let names: Vec<&str> = aborted.iter().map(|k| k.as_str()).collect();
        bail!("aborted kinds: {}", names.join(", "));
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

/// Minimal interactive query loop against the imported database.
///
/// Reads one statement per line; an empty line or end of input exits.
async fn run_sql_prompt(store: &SqliteStore) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        print!("sql> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let line = match lines.next_line().await.context("Failed to read stdin")? {
            Some(line) => line,
            None => break,
        };
        let statement = line.trim();
        if statement.is_empty() {
            break;
        }

        match store.query_rows(statement).await {
            Ok(rows) => {
                for row in &rows {
                    println!("{}", store::render_row(row));
                }
                println!("({} rows)", rows.len());
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_comma_separated_files() {
        let cli = Cli::parse_from(["qos-import", "--client-qos", "a.json,b.json", "--clean"]);
        assert_eq!(cli.client_qos.len(), 2);
        assert!(cli.clean);
        assert!(!cli.interactive);
    }
}
