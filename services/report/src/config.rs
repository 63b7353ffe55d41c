//! Configuration for the report service.
//!
//! Values come from `config/default`, an optional `config/{RUN_MODE}`
//! overlay, and `QOS_REPORT_*` environment variables, in that order.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Top-level configuration for the report service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReportConfig {
    /// Load configuration from files and environment.
    ///
    /// Environment variables use the `QOS_REPORT` prefix with `__` as the
    /// section separator, e.g. `QOS_REPORT_OUTPUT__CSV_PATH=report.csv`.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("QOS_REPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.output.csv_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingField(
                "output.csv_path".to_string(),
            ));
        }
        if self.chart.width < 16 {
            return Err(ConfigValidationError::InvalidValue {
                field: "chart.width".to_string(),
                message: "must be at least 16 columns".to_string(),
            });
        }
        if self.chart.height == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "chart.height".to_string(),
                message: "must be at least 1 row".to_string(),
            });
        }
        Ok(())
    }
}

/// Report output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Destination CSV path.
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("output.csv")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

/// Terminal chart settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_width")]
    pub width: usize,
    #[serde(default = "default_chart_height")]
    pub height: usize,
    /// Render terminal charts after writing the CSV.
    #[serde(default = "default_chart_enabled")]
    pub enabled: bool,
}

fn default_chart_width() -> usize {
    96
}

fn default_chart_height() -> usize {
    14
}

fn default_chart_enabled() -> bool {
    true
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
            enabled: default_chart_enabled(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
