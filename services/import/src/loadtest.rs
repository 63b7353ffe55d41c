//! Loadtest log ingestion.
//!
//! Loadtest runs leave line-oriented client logs instead of hit envelopes.
//! Lines reporting receive-stream statistics are matched and regrouped into
//! one synthetic record per (user, media) pair; those records then flow
//! through the normal flatten/insert path like any structured input.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadtestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid statistics line pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Key a statistics group is accumulated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    user: String,
    media: String,
}

/// Extracts grouped receive-stream statistics from loadtest logs.
pub struct LoadtestParser {
    line: Regex,
}

impl LoadtestParser {
    pub fn new() -> Result<Self, LoadtestError> {
        // `UserId 42: audio ... receiveStreamStatistic: getPacketsReceived: 52344`
        let line = Regex::new(
            r"UserId\s+(?P<user>\S+):\s+(?P<media>screen share|\w+)\b.*?receiveStreamStatistic:\s*get(?P<field>\w+):\s*(?P<value>-?\d+(?:\.\d+)?)",
        )?;
        Ok(Self { line })
    }

    /// Parse a whole log, returning one record per (user, media) group in
    /// first-seen order.
    pub fn parse_log(&self, text: &str) -> Vec<Value> {
        let mut order: Vec<StreamKey> = Vec::new();
        let mut groups: HashMap<StreamKey, Map<String, Value>> = HashMap::new();

        for line in text.lines() {
            let caps = match self.line.captures(line) {
                Some(caps) => caps,
                None => continue,
            };
            let key = StreamKey {
                user: caps["user"].to_string(),
                media: caps["media"].to_string(),
            };
            let fields = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Map::new()
            });
            // Repeated reports for the same getter keep the latest value.
            fields.insert(caps["field"].to_string(), parse_number(&caps["value"]));
        }

        order
            .into_iter()
            .map(|key| {
                let mut fields = groups.remove(&key).unwrap_or_default();
                fields.insert("userId".to_string(), Value::String(key.user));
                fields.insert("mediaType".to_string(), Value::String(key.media));
                Value::Object(fields)
            })
            .collect()
    }

    /// Load a log file and parse it.
    pub async fn load_log(&self, path: &Path) -> Result<Vec<Value>, LoadtestError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadtestError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(self.parse_log(&text))
    }
}

fn parse_number(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    match text.parse::<f64>() {
        Ok(f) => Value::from(f),
        Err(_) => Value::String(text.to_string()),
    }
}
