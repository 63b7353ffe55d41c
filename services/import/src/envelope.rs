//! Search-engine result envelope.
//!
//! QoS exports arrive in the paging envelope the indexing system produces:
//! `{ "hits": { "total": N, "hits": [ { "_source": {...} }, ... ] } }`.
//! Only the `_source` payloads matter downstream; they stay dynamic JSON
//! because their shape is owned by the exporter, not this service.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level envelope wrapper.
#[derive(Debug, Deserialize)]
pub struct HitEnvelope {
    pub hits: HitList,
}

/// Paged hit list with the index-reported total.
#[derive(Debug, Deserialize)]
pub struct HitList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// One indexed document; the record payload lives under `_source`.
#[derive(Debug, Deserialize)]
pub struct Hit {
    #[serde(rename = "_source")]
    pub source: serde_json::Value,
}

/// Parse an envelope and return the `_source` payloads in file order.
pub fn parse_sources(text: &str, path: &Path) -> Result<Vec<serde_json::Value>, EnvelopeError> {
    let envelope: HitEnvelope =
        serde_json::from_str(text).map_err(|source| EnvelopeError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    let total = envelope.hits.total;
    let sources: Vec<_> = envelope
        .hits
        .hits
        .into_iter()
        .map(|hit| hit.source)
        .collect();
    if total as usize != sources.len() {
        // The exporter pages results; a dump can hold fewer hits than the
        // index-wide total.
        debug!(
            total,
            loaded = sources.len(),
            path = %path.display(),
            "hit total differs from page size"
        );
    }
    Ok(sources)
}

/// Load a dump file and return the `_source` payloads in file order.
pub async fn load_sources(path: &Path) -> Result<Vec<serde_json::Value>, EnvelopeError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EnvelopeError::Io {
            path: path.display().to_string(),
            source,
        })?;
    parse_sources(&text, path)
}
