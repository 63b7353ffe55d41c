//! Configuration for the import service.
//!
//! Values come from `config/default`, an optional `config/{RUN_MODE}`
//! overlay, and `QOS_IMPORT_*` environment variables, in that order.

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

/// Top-level configuration for the import service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ImportConfig {
    /// Load configuration from files and environment.
    ///
    /// Environment variables use the `QOS_IMPORT` prefix with `__` as the
    /// section separator, e.g. `QOS_IMPORT_DATABASE__PATH=/var/lib/qos.db`.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("QOS_IMPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingField(
                "database.path".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "database.max_connections".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.import.max_concurrent_files == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "import.max_concurrent_files".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path; created on first open.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("qos.db")
}

fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportSection {
    /// Upper bound on input files parsed and inserted at once.
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
}

fn default_max_concurrent_files() -> usize {
    4
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            max_concurrent_files: default_max_concurrent_files(),
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
