//! Import orchestration.
//!
//! A run moves through fixed phases: materialize schemas and create every
//! table for the selected kinds, then ingest all files, then report. Table
//! creation failures are fatal before any insert happens. During ingestion
//! each kind gets a supervisor task owning one task per input file; a
//! malformed file aborts only its own kind's remaining work, while a failed
//! insert cancels everything and fails the run.

use crate::config::ImportConfig;
use crate::derived;
use crate::envelope;
use crate::flatten::{self, FlatRow};
use crate::loadtest::{LoadtestError, LoadtestParser};
use crate::schema::{RecordKind, SchemaError, SchemaManager};
use crate::store::{RowSink, StoreError};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum ImportError {
    /// Input file unreadable or unparseable; aborts only the owning kind.
    #[error("kind {kind}, file {path} unreadable: {reason}")]
    MalformedInput {
        kind: RecordKind,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("insert into {table} failed for kind {kind}: {source}")]
    Insert {
        kind: RecordKind,
        table: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Loadtest(#[from] LoadtestError),

    #[error("an import worker stopped unexpectedly")]
    Worker,
}

/// Input files grouped by record kind.
#[derive(Debug, Clone, Default)]
pub struct ImportSelection {
    pub client_qos: Vec<PathBuf>,
    pub server_qos: Vec<PathBuf>,
    pub session: Vec<PathBuf>,
    pub loadtest: Vec<PathBuf>,
}

impl ImportSelection {
    pub fn is_empty(&self) -> bool {
        self.client_qos.is_empty()
            && self.server_qos.is_empty()
            && self.session.is_empty()
            && self.loadtest.is_empty()
    }

    /// Kinds with at least one table to create; selecting sessions implies
    /// the session_user table.
    pub fn active_kinds(&self) -> Vec<RecordKind> {
        let mut kinds = Vec::new();
        if !self.client_qos.is_empty() {
            kinds.push(RecordKind::ClientQos);
        }
        if !self.server_qos.is_empty() {
            kinds.push(RecordKind::ServerQos);
        }
        if !self.session.is_empty() {
            kinds.push(RecordKind::Session);
            kinds.push(RecordKind::SessionUser);
        }
        if !self.loadtest.is_empty() {
            kinds.push(RecordKind::Loadtest);
        }
        kinds
    }

    fn file_groups(&self) -> Vec<(RecordKind, Vec<PathBuf>)> {
        let mut groups = Vec::new();
        if !self.client_qos.is_empty() {
            groups.push((RecordKind::ClientQos, self.client_qos.clone()));
        }
        if !self.server_qos.is_empty() {
            groups.push((RecordKind::ServerQos, self.server_qos.clone()));
        }
        if !self.session.is_empty() {
            groups.push((RecordKind::Session, self.session.clone()));
        }
        if !self.loadtest.is_empty() {
            groups.push((RecordKind::Loadtest, self.loadtest.clone()));
        }
        groups
    }
}

/// Per-kind outcome of a run.
#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: RecordKind,
    pub files: usize,
    /// Rows inserted per destination table; session inputs write two.
    pub rows: Vec<(String, u64)>,
    /// Abort reason when the kind's ingestion was cut short.
    pub aborted: Option<String>,
}

impl KindReport {
    pub fn row_total(&self) -> u64 {
        self.rows.iter().map(|(_, n)| n).sum()
    }
}

/// Whole-run outcome.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub kinds: Vec<KindReport>,
}

impl ImportReport {
    /// Kinds whose ingestion aborted on malformed input.
    pub fn aborted_kinds(&self) -> Vec<RecordKind> {
        self.kinds
            .iter()
            .filter(|k| k.aborted.is_some())
            .map(|k| k.kind)
            .collect()
    }

    pub fn total_rows(&self) -> u64 {
        self.kinds.iter().map(KindReport::row_total).sum()
    }
}

#[derive(Debug, Default)]
struct FileStats {
    rows: Vec<(String, u64)>,
}

impl FileStats {
    fn single(table: &str, rows: u64) -> Self {
        Self {
            rows: vec![(table.to_string(), rows)],
        }
    }

    fn total(&self) -> u64 {
        self.rows.iter().map(|(_, n)| n).sum()
    }
}

/// Orchestrates one import run against a row sink.
pub struct Importer<S: RowSink + 'static> {
    sink: Arc<S>,
    semaphore: Arc<Semaphore>,
    parser: Arc<LoadtestParser>,
}

impl<S: RowSink + 'static> Importer<S> {
    pub fn new(config: &ImportConfig, sink: Arc<S>) -> Result<Self, ImportError> {
        Ok(Self {
            sink,
            semaphore: Arc::new(Semaphore::new(config.import.max_concurrent_files)),
            parser: Arc::new(LoadtestParser::new()?),
        })
    }

    /// Run a full import: create every table for the selection, then ingest
    /// all files concurrently.
    #[instrument(skip(self, selection), fields(kinds = selection.active_kinds().len()))]
    pub async fn run(&self, selection: &ImportSelection) -> Result<ImportReport, ImportError> {
        let kinds = selection.active_kinds();
        let manager = SchemaManager::for_kinds(&kinds)?;
        manager.create_all(self.sink.as_ref()).await?;
        info!(tables = kinds.len(), "schema ready");

        let mut supervisors: JoinSet<Result<KindReport, ImportError>> = JoinSet::new();
        for (kind, files) in selection.file_groups() {
            let sink = Arc::clone(&self.sink);
            let semaphore = Arc::clone(&self.semaphore);
            let parser = Arc::clone(&self.parser);
            supervisors.spawn(import_kind(kind, files, sink, semaphore, parser));
        }

        let mut report = ImportReport::default();
        while let Some(joined) = supervisors.join_next().await {
            match joined {
                Ok(Ok(kind_report)) => {
                    match &kind_report.aborted {
                        Some(reason) => {
                            warn!(kind = %kind_report.kind, reason, "kind aborted")
                        }
                        None => info!(
                            kind = %kind_report.kind,
                            files = kind_report.files,
                            rows = kind_report.row_total(),
                            "kind imported"
                        ),
                    }
                    report.kinds.push(kind_report);
                }
                Ok(Err(err)) => {
                    supervisors.abort_all();
                    return Err(err);
                }
                Err(err) if err.is_cancelled() => {}
                Err(_) => {
                    supervisors.abort_all();
                    return Err(ImportError::Worker);
                }
            }
        }
        report.kinds.sort_by_key(|k| k.kind.as_str());
        info!(rows = report.total_rows(), "import finished");
        Ok(report)
    }
}

/// Supervise all files of one kind. Malformed input aborts the remaining
/// files of this kind only; insert failures propagate and take the whole
/// run down.
async fn import_kind<S: RowSink + 'static>(
    kind: RecordKind,
    files: Vec<PathBuf>,
    sink: Arc<S>,
    semaphore: Arc<Semaphore>,
    parser: Arc<LoadtestParser>,
) -> Result<KindReport, ImportError> {
    let mut report = KindReport {
        kind,
        files: files.len(),
        rows: Vec::new(),
        aborted: None,
    };

    let mut tasks: JoinSet<Result<FileStats, ImportError>> = JoinSet::new();
    for path in files {
        let sink = Arc::clone(&sink);
        let semaphore = Arc::clone(&semaphore);
        let parser = Arc::clone(&parser);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| ImportError::Worker)?;
            import_file(kind, &path, sink.as_ref(), parser.as_ref()).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(stats)) => merge_rows(&mut report.rows, stats.rows),
            Ok(Err(err @ ImportError::MalformedInput { .. })) => {
                error!(kind = %kind, %err, "input unreadable, aborting kind");
                tasks.abort_all();
                report.aborted = Some(err.to_string());
                break;
            }
            Ok(Err(fatal)) => {
                tasks.abort_all();
                return Err(fatal);
            }
            Err(err) if err.is_cancelled() => {}
            Err(_) => {
                tasks.abort_all();
                return Err(ImportError::Worker);
            }
        }
    }
    Ok(report)
}

async fn import_file<S: RowSink>(
    kind: RecordKind,
    path: &Path,
    sink: &S,
    parser: &LoadtestParser,
) -> Result<FileStats, ImportError> {
    let stats = match kind {
        RecordKind::ClientQos | RecordKind::ServerQos => {
            import_qos_file(kind, path, sink).await?
        }
        RecordKind::Session => import_session_file(path, sink).await?,
        RecordKind::Loadtest => import_loadtest_file(path, sink, parser).await?,
        RecordKind::SessionUser => FileStats::default(),
    };
    info!(kind = %kind, file = %path.display(), rows = stats.total(), "imported file");
    Ok(stats)
}

async fn import_qos_file<S: RowSink>(
    kind: RecordKind,
    path: &Path,
    sink: &S,
) -> Result<FileStats, ImportError> {
    let sources = envelope::load_sources(path)
        .await
        .map_err(|err| malformed(kind, path, err))?;
    let mut rows = 0u64;
    for mut source in sources {
        derived::add_loss_ratios(&mut source);
        let row = flatten::flatten_record(&source);
        rows += insert_prepared(kind, kind.table(), &row, sink).await?;
    }
    Ok(FileStats::single(kind.table(), rows))
}

async fn import_session_file<S: RowSink>(
    path: &Path,
    sink: &S,
) -> Result<FileStats, ImportError> {
    let kind = RecordKind::Session;
    let sources = envelope::load_sources(path)
        .await
        .map_err(|err| malformed(kind, path, err))?;
    let mut sessions = 0u64;
    let mut users = 0u64;
    for source in sources {
        let (session, participants) = explode_session(source);
        let row = flatten::flatten_record(&session);
        sessions += insert_prepared(kind, kind.table(), &row, sink).await?;
        for participant in participants {
            let row = flatten::flatten_record(&participant);
            users += insert_prepared(
                RecordKind::SessionUser,
                RecordKind::SessionUser.table(),
                &row,
                sink,
            )
            .await?;
        }
    }
    Ok(FileStats {
        rows: vec![
            (kind.table().to_string(), sessions),
            (RecordKind::SessionUser.table().to_string(), users),
        ],
    })
}

async fn import_loadtest_file<S: RowSink>(
    path: &Path,
    sink: &S,
    parser: &LoadtestParser,
) -> Result<FileStats, ImportError> {
    let kind = RecordKind::Loadtest;
    let records = parser
        .load_log(path)
        .await
        .map_err(|err| malformed(kind, path, err))?;
    let mut rows = 0u64;
    for record in records {
        let row = flatten::flatten_record(&record);
        rows += insert_prepared(kind, kind.table(), &row, sink).await?;
    }
    Ok(FileStats::single(kind.table(), rows))
}

async fn insert_prepared<S: RowSink>(
    kind: RecordKind,
    table: &str,
    row: &FlatRow,
    sink: &S,
) -> Result<u64, ImportError> {
    if row.is_empty() {
        warn!(kind = %kind, table, "record flattened to nothing, skipping");
        return Ok(0);
    }
    sink.insert_row(table, row)
        .await
        .map_err(|source| ImportError::Insert {
            kind,
            table: table.to_string(),
            source,
        })?;
    Ok(1)
}

fn malformed(kind: RecordKind, path: &Path, err: impl fmt::Display) -> ImportError {
    ImportError::MalformedInput {
        kind,
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

const SESSION_USER_TIME_SERIES: &[&str] = &[
    "audioTimeSeries",
    "videoTimeSeries",
    "screenShareTimeSeries",
];

/// Split one session record into the session row and its per-user rows.
///
/// The per-user list comes off the session row; each user entry loses its
/// per-media time-series fields, which are not modeled relationally.
fn explode_session(mut source: Value) -> (Value, Vec<Value>) {
    let raw_users = match source.as_object_mut() {
        Some(map) => match map.remove("userStatList") {
            Some(Value::Array(list)) => list,
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    let users = raw_users
        .into_iter()
        .map(|mut user| {
            if let Some(map) = user.as_object_mut() {
                for field in SESSION_USER_TIME_SERIES {
                    map.remove(*field);
                }
            }
            user
        })
        .collect();
    (source, users)
}

fn merge_rows(into: &mut Vec<(String, u64)>, from: Vec<(String, u64)>) {
    for (table, rows) in from {
        match into.iter_mut().find(|(t, _)| *t == table) {
            Some((_, total)) => *total += rows,
            None => into.push((table, rows)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        statements: Mutex<Vec<String>>,
        rows: Mutex<Vec<(String, FlatRow)>>,
        fail_on_table: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl RowSink for MemorySink {
        async fn run_statement(&self, sql: &str) -> Result<(), StoreError> {
            self.statements.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        async fn insert_row(&self, table: &str, row: &FlatRow) -> Result<(), StoreError> {
            if Some(table) == self.fail_on_table {
                return Err(StoreError::Statement {
                    source: sqlx::Error::RowNotFound,
                });
            }
            self.rows
                .lock()
                .unwrap()
                .push((table.to_string(), row.clone()));
            Ok(())
        }
    }

    fn create_test_importer(
        sink: Arc<MemorySink>,
    ) -> Importer<MemorySink> {
        Importer::new(&ImportConfig::default(), sink).unwrap()
    }

    fn write_session_dump(dir: &tempfile::TempDir) -> PathBuf {
        let dump = json!({
            "hits": { "total": 1, "hits": [ { "_source": {
                "sessionId": "s1",
                "participantCount": 3,
                "userStatList": [
                    { "userId": "u1", "joinTime": 5, "audioTimeSeries": [1, 2] },
                    { "userId": "u2", "videoTimeSeries": [3] },
                    { "userId": "u3", "screenShareTimeSeries": [4] }
                ]
            } } ] }
        });
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, dump.to_string()).unwrap();
        path
    }

    fn write_qos_dump(dir: &tempfile::TempDir) -> PathBuf {
        let dump = json!({
            "hits": { "total": 1, "hits": [ { "_source": {
                "userId": "u1",
                "qosItems": { "PLL": 10, "PR": 100, "OR": 4800 }
            } } ] }
        });
        let path = dir.path().join("qos.json");
        std::fs::write(&path, dump.to_string()).unwrap();
        path
    }

    #[test]
    fn test_selection_active_kinds() {
        let selection = ImportSelection {
            session: vec![PathBuf::from("s.json")],
            ..Default::default()
        };
        assert_eq!(
            selection.active_kinds(),
            vec![RecordKind::Session, RecordKind::SessionUser]
        );
        assert!(ImportSelection::default().is_empty());
    }

    #[test]
    fn test_explode_session_shapes() {
        let (session, users) = explode_session(json!({
            "sessionId": "s1",
            "userStatList": [
                { "userId": "u1", "audioTimeSeries": [1] },
                { "userId": "u2" },
                { "userId": "u3" }
            ]
        }));
        assert_eq!(users.len(), 3);
        assert!(session.get("userStatList").is_none());
        assert!(users[0].get("audioTimeSeries").is_none());
        assert_eq!(users[0]["userId"], json!("u1"));
    }

    #[tokio::test]
    async fn test_session_import_explodes_into_user_rows() {
        let dir = tempfile::tempdir().unwrap();
        let selection = ImportSelection {
            session: vec![write_session_dump(&dir)],
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::default());
        let report = create_test_importer(Arc::clone(&sink))
            .run(&selection)
            .await
            .unwrap();
        assert!(report.aborted_kinds().is_empty());
        assert_eq!(report.total_rows(), 4);

        let rows = sink.rows.lock().unwrap();
        let sessions: Vec<_> = rows.iter().filter(|(t, _)| t == "session").collect();
        let users: Vec<_> = rows.iter().filter(|(t, _)| t == "session_user").collect();
        assert_eq!(sessions.len(), 1);
        assert_eq!(users.len(), 3);
        assert!(sessions[0].1.names.iter().all(|n| n != "userStatList"));
        for (_, row) in &users {
            assert!(row.names.iter().all(|n| !n.ends_with("TimeSeries")));
        }

        let statements = sink.statements.lock().unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().any(|s| s.contains("session_user")));
    }

    #[tokio::test]
    async fn test_qos_import_attaches_derived_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let selection = ImportSelection {
            client_qos: vec![write_qos_dump(&dir)],
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::default());
        create_test_importer(Arc::clone(&sink))
            .run(&selection)
            .await
            .unwrap();
        let rows = sink.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        let (table, row) = &rows[0];
        assert_eq!(table, "client_qos");
        assert!(row.names.iter().any(|n| n == "p_loss_rcvd"));
        assert_eq!(row.names.len(), row.values.len());
    }

    #[tokio::test]
    async fn test_malformed_file_aborts_kind_only() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        let log = dir.path().join("run.log");
        std::fs::write(
            &log,
            "UserId 1: audio receiveStreamStatistic: getPacketsLost: 3\n",
        )
        .unwrap();

        let selection = ImportSelection {
            client_qos: vec![bad],
            loadtest: vec![log],
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::default());
        let report = create_test_importer(Arc::clone(&sink))
            .run(&selection)
            .await
            .unwrap();
        assert_eq!(report.aborted_kinds(), vec![RecordKind::ClientQos]);

        let rows = sink.rows.lock().unwrap();
        assert!(rows.iter().any(|(t, _)| t == "loadtest"));
    }

    #[tokio::test]
    async fn test_insert_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let selection = ImportSelection {
            client_qos: vec![write_qos_dump(&dir)],
            ..Default::default()
        };
        let sink = Arc::new(MemorySink {
            fail_on_table: Some("client_qos"),
            ..Default::default()
        });
        let err = create_test_importer(sink).run(&selection).await.unwrap_err();
        assert!(matches!(err, ImportError::Insert { .. }));
    }

    #[tokio::test]
    async fn test_empty_dump_imports_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{ "hits": { "total": 0, "hits": [] } }"#).unwrap();
        let selection = ImportSelection {
            client_qos: vec![path],
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::default());
        let report = create_test_importer(Arc::clone(&sink))
            .run(&selection)
            .await
            .unwrap();
        assert_eq!(report.total_rows(), 0);
        assert!(report.aborted_kinds().is_empty());
    }
}
