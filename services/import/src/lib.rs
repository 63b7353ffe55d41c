//! QoS Import Service
//!
//! Ingestion service for the Callscope call-quality analytics toolkit. This
//! service reads search-engine result dumps of client/server QoS records and
//! session records, plus load-test console logs, flattens each record into a
//! typed row, and imports everything into a local SQLite database for ad-hoc
//! analysis.
//!
//! ## Features
//!
//! - **Schema From Templates**: Table layouts derived from embedded
//!   representative records and created idempotently on every run
//! - **Recursive Flattening**: Nested records map to flat columns keyed by
//!   leaf field name, with SQL types inferred per value
//! - **Derived Loss Ratios**: Sent and received packet-loss ratios computed
//!   per QoS record at import time
//! - **Bounded Concurrency**: Per-kind task groups over a global file-level
//!   concurrency limit, with first-error cancellation
//!
//! ## Architecture
//!
//! ```text
//! Input dumps                Import pipeline             SQLite
//! ┌──────────────┐          ┌──────────────┐          ┌──────────────┐
//! │ client-qos   │          │ Envelope /   │          │ client_qos   │
//! │ server-qos   │─────────▶│ Log Parsers  │          │ server_qos   │
//! │ session      │          └──────────────┘          │ session      │
//! │ loadtest     │                 │                  │ session_user │
//! └──────────────┘                 ▼                  │ loadtest     │
//!                           ┌──────────────┐          └──────────────┘
//!                           │ Derived      │                 ▲
//!                           │ Fields       │                 │
//!                           └──────────────┘                 │
//!                                  │                         │
//!                                  ▼                         │
//!                           ┌──────────────┐          ┌──────────────┐
//!                           │ Flattener    │─────────▶│ Row Sink     │
//!                           └──────────────┘          └──────────────┘
//! ```

pub mod config;
pub mod derived;
pub mod envelope;
pub mod flatten;
pub mod importer;
pub mod loadtest;
pub mod schema;
pub mod sql_value;
pub mod store;

pub use config::{ConfigValidationError, ImportConfig};
pub use envelope::EnvelopeError;
pub use flatten::{ColumnDef, FlatRow};
pub use importer::{ImportError, ImportReport, ImportSelection, Importer, KindReport};
pub use loadtest::{LoadtestError, LoadtestParser};
pub use schema::{RecordKind, SchemaError, SchemaManager, TableSchema};
pub use sql_value::SqlScalar;
pub use store::{QosTableSummary, RowSink, SqliteStore, StoreError};
