//! Record kinds, template schemas, and table creation.
//!
//! Each record kind carries a static JSON template naming every field the
//! relational schema models, with one representative value per leaf (a null
//! documents a field that exists upstream but is deliberately not modeled).
//! Templates are walked exactly once at startup into declarative column
//! lists; the import path never re-reads them.

use crate::flatten::{self, ColumnDef};
use crate::store::{RowSink, StoreError};
use std::fmt;
use thiserror::Error;
use tracing::debug;

const CLIENT_QOS_TEMPLATE: &str = include_str!("../templates/client_qos.json");
const SERVER_QOS_TEMPLATE: &str = include_str!("../templates/server_qos.json");
const SESSION_TEMPLATE: &str = include_str!("../templates/session.json");
const SESSION_USER_TEMPLATE: &str = include_str!("../templates/session_user.json");
const LOADTEST_TEMPLATE: &str = include_str!("../templates/loadtest.json");

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("template for kind {kind} is not valid JSON: {source}")]
    BadTemplate {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("template for kind {kind} yields no columns")]
    EmptyTemplate { kind: RecordKind },

    #[error("failed to create table {table}: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: StoreError,
    },
}

/// The kinds of records the store models.
///
/// `SessionUser` has no input files of its own: its rows are exploded out of
/// session records. It still owns a table and a template like any other
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ClientQos,
    ServerQos,
    Session,
    SessionUser,
    Loadtest,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::ClientQos,
        RecordKind::ServerQos,
        RecordKind::Session,
        RecordKind::SessionUser,
        RecordKind::Loadtest,
    ];

    /// CLI spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ClientQos => "client-qos",
            RecordKind::ServerQos => "server-qos",
            RecordKind::Session => "session",
            RecordKind::SessionUser => "session-user",
            RecordKind::Loadtest => "loadtest",
        }
    }

    /// Destination table for the kind.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::ClientQos => "client_qos",
            RecordKind::ServerQos => "server_qos",
            RecordKind::Session => "session",
            RecordKind::SessionUser => "session_user",
            RecordKind::Loadtest => "loadtest",
        }
    }

    /// Whether records of this kind carry QoS counters and derived ratios.
    pub fn is_qos(&self) -> bool {
        matches!(self, RecordKind::ClientQos | RecordKind::ServerQos)
    }

    fn template_text(&self) -> &'static str {
        match self {
            RecordKind::ClientQos => CLIENT_QOS_TEMPLATE,
            RecordKind::ServerQos => SERVER_QOS_TEMPLATE,
            RecordKind::Session => SESSION_TEMPLATE,
            RecordKind::SessionUser => SESSION_USER_TEMPLATE,
            RecordKind::Loadtest => LOADTEST_TEMPLATE,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column layout for one destination table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub kind: RecordKind,
    pub table: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Build the schema for one kind by walking its embedded template.
    pub fn for_kind(kind: RecordKind) -> Result<Self, SchemaError> {
        let template: serde_json::Value = serde_json::from_str(kind.template_text())
            .map_err(|source| SchemaError::BadTemplate { kind, source })?;
        let columns = flatten::schema_columns(&template);
        if columns.is_empty() {
            return Err(SchemaError::EmptyTemplate { kind });
        }
        Ok(Self {
            kind,
            table: kind.table(),
            columns,
        })
    }

    /// Render the idempotent CREATE TABLE statement for this schema.
    pub fn create_statement(&self) -> String {
        let decls: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", flatten::quote_ident(&c.name), c.sql_type))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            decls.join(", ")
        )
    }
}

/// Builds and issues table creation for every active kind.
pub struct SchemaManager {
    schemas: Vec<TableSchema>,
}

impl SchemaManager {
    /// Materialize the schemas for the given kinds.
    pub fn for_kinds(kinds: &[RecordKind]) -> Result<Self, SchemaError> {
        let schemas = kinds
            .iter()
            .map(|kind| TableSchema::for_kind(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { schemas })
    }

    pub fn schemas(&self) -> &[TableSchema] {
        &self.schemas
    }

    /// Create every table. Any single failure aborts before imports start.
    pub async fn create_all<S: RowSink + ?Sized>(&self, sink: &S) -> Result<(), SchemaError> {
        for schema in &self.schemas {
            sink.run_statement(&schema.create_statement())
                .await
                .map_err(|source| SchemaError::CreateTable {
                    table: schema.table.to_string(),
                    source,
                })?;
            debug!(
                table = schema.table,
                columns = schema.columns.len(),
                "table ready"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_embedded_template_yields_a_schema() {
        for kind in RecordKind::ALL {
            let schema = TableSchema::for_kind(kind).unwrap();
            assert!(!schema.columns.is_empty(), "kind {kind}");
        }
    }

    #[test]
    fn test_client_qos_schema_has_derived_columns() {
        let schema = TableSchema::for_kind(RecordKind::ClientQos).unwrap();
        let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"p_loss_rcvd"));
        assert!(names.contains(&"p_loss_sent"));
        assert!(names.contains(&"OR"));
        assert!(names.contains(&"TB"));
    }

    #[test]
    fn test_session_template_omits_user_stat_list() {
        let schema = TableSchema::for_kind(RecordKind::Session).unwrap();
        assert!(!schema.columns.iter().any(|c| c.name == "userStatList"));
    }

    #[test]
    fn test_session_user_template_omits_time_series() {
        let schema = TableSchema::for_kind(RecordKind::SessionUser).unwrap();
        assert!(!schema
            .columns
            .iter()
            .any(|c| c.name.ends_with("TimeSeries")));
    }

    #[test]
    fn test_templates_are_collision_free() {
        for kind in RecordKind::ALL {
            let schema = TableSchema::for_kind(kind).unwrap();
            let mut names: Vec<&String> =
                schema.columns.iter().map(|c| &c.name).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), schema.columns.len(), "kind {kind}");
        }
    }

    #[test]
    fn test_create_statement_quotes_reserved_words() {
        let schema = TableSchema::for_kind(RecordKind::ClientQos).unwrap();
        let sql = schema.create_statement();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS client_qos ("));
        assert!(sql.contains("\"OR\" INTEGER"));
        assert!(sql.contains("\"p_loss_rcvd\" REAL"));
        assert!(sql.contains("\"mediaLost\" NUMERIC"));
    }

    #[test]
    fn test_kind_round_trip_labels() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert!(RecordKind::ClientQos.is_qos());
        assert!(!RecordKind::Session.is_qos());
    }
}
