//! SQLite-backed record store.
//!
//! One writer, append-only, no migrations beyond idempotent table creation.
//! The pool exists so file-level import tasks can insert concurrently; WAL
//! mode plus a per-connection busy timeout keeps them from tripping over
//! each other.

use crate::flatten::{quote_ident, FlatRow};
use crate::sql_value::SqlScalar;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("statement failed: {source}")]
    Statement {
        #[source]
        source: sqlx::Error,
    },

    #[error("insert into {table} failed: {source}")]
    Insert {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to remove store file {path}: {source}")]
    Clean {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for flattened rows.
///
/// The importer only needs "run this statement" and "insert this row"; the
/// seam lets orchestration tests run against an in-memory collector instead
/// of SQLite.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Execute a DDL or utility statement.
    async fn run_statement(&self, sql: &str) -> Result<(), StoreError>;

    /// Insert one flattened row into `table`.
    async fn insert_row(&self, table: &str, row: &FlatRow) -> Result<(), StoreError>;
}

/// Row counts for one imported QoS table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QosTableSummary {
    pub rows: i64,
    pub rtc_instances: i64,
    pub rtc_sessions: i64,
    pub users: i64,
    pub error_rows: i64,
    pub audio_active: i64,
    pub video_active: i64,
    pub screen_share_active: i64,
}

/// Pooled handle to the SQLite store file.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the store file at `path`.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let store = Self::connect(&url, max_connections).await?;
        info!(path = %path.display(), "store ready");
        Ok(store)
    }

    /// Open an ephemeral in-memory store.
    ///
    /// Pinned to one connection: each in-memory connection would otherwise
    /// see its own empty database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let open_err = |source| StoreError::Open {
            path: url.to_string(),
            source,
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA synchronous = NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA temp_store = MEMORY;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(open_err)?;

        sqlx::query("PRAGMA journal_mode = WAL;")
            .execute(&pool)
            .await
            .map_err(open_err)?;

        Ok(Self { pool })
    }

    /// Delete the persisted store and its WAL sidecars. Destructive; the
    /// caller owns the opt-in.
    pub fn clean(path: &Path) -> Result<(), StoreError> {
        for suffix in ["", "-wal", "-shm"] {
            let mut target = path.as_os_str().to_owned();
            target.push(suffix);
            let target = Path::new(&target);
            match std::fs::remove_file(target) {
                Ok(()) => debug!(path = %target.display(), "removed"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Clean {
                        path: target.display().to_string(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    /// Run a single scalar COUNT-style query.
    pub async fn count(&self, sql: &str) -> Result<i64, StoreError> {
        let value: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| StoreError::Statement { source })?;
        Ok(value)
    }

    /// Fetch every row a statement produces.
    pub async fn query_rows(&self, sql: &str) -> Result<Vec<SqliteRow>, StoreError> {
        sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| StoreError::Statement { source })
    }

    /// Canned post-import counts for one QoS table.
    pub async fn qos_summary(&self, table: &str) -> Result<QosTableSummary, StoreError> {
        let media_active = |media: &str| {
            format!("SELECT COUNT(*) FROM {table} WHERE \"MT\" = '{media}' AND \"OR\" > 0")
        };
        Ok(QosTableSummary {
            rows: self.count(&format!("SELECT COUNT(*) FROM {table}")).await?,
            rtc_instances: self
                .count(&format!(
                    "SELECT COUNT(DISTINCT \"rtcInstanceId\") FROM {table}"
                ))
                .await?,
            rtc_sessions: self
                .count(&format!(
                    "SELECT COUNT(DISTINCT \"rtcSessionId\") FROM {table}"
                ))
                .await?,
            users: self
                .count(&format!("SELECT COUNT(DISTINCT \"userId\") FROM {table}"))
                .await?,
            error_rows: self
                .count(&format!(
                    "SELECT COUNT(*) FROM {table} WHERE \"INFO\" <> 'NORMAL'"
                ))
                .await?,
            audio_active: self.count(&media_active("audio")).await?,
            video_active: self.count(&media_active("video")).await?,
            screen_share_active: self.count(&media_active("screen share")).await?,
        })
    }
}

#[async_trait]
impl RowSink for SqliteStore {
    async fn run_statement(&self, sql: &str) -> Result<(), StoreError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Statement { source })?;
        Ok(())
    }

    async fn insert_row(&self, table: &str, row: &FlatRow) -> Result<(), StoreError> {
        let columns: Vec<String> = row.names.iter().map(|n| quote_ident(n)).collect();
        let placeholders = vec!["?"; row.len()];
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in &row.values {
            query = match value {
                SqlScalar::Integer(i) => query.bind(*i),
                SqlScalar::Real(f) => query.bind(*f),
                SqlScalar::Text(s) => query.bind(s.as_str()),
                SqlScalar::Boolean(b) => query.bind(i64::from(*b)),
            };
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Insert {
                table: table.to_string(),
                source,
            })?;
        Ok(())
    }
}

/// Render one row as `name=value` pairs for console output.
///
/// SQLite reports the storage class of each value, so decoding happens per
/// cell rather than per declared column type.
pub fn render_row(row: &SqliteRow) -> String {
    let mut parts = Vec::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let rendered = match row.try_get_raw(i) {
            Ok(raw) if raw.is_null() => "NULL".to_string(),
            Ok(raw) => match raw.type_info().name() {
                "INTEGER" => row
                    .try_get::<i64, _>(i)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|e| format!("<{e}>")),
                "REAL" => row
                    .try_get::<f64, _>(i)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|e| format!("<{e}>")),
                "TEXT" => row
                    .try_get::<String, _>(i)
                    .unwrap_or_else(|e| format!("<{e}>")),
                "BLOB" => "<blob>".to_string(),
                other => format!("<{other}>"),
            },
            Err(err) => format!("<{err}>"),
        };
        parts.push(format!("{}={}", column.name(), rendered));
    }
    parts.join(" | ")
}
