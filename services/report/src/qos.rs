//! QoS dump loading.
//!
//! The reporter consumes the same search-engine result dumps the importer
//! does, but it only needs the handful of fields that drive concurrency
//! analysis, so records deserialize into a narrow [`Stream`] shape instead
//! of being flattened.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
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

/// Media classification of one QoS stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
    ScreenSharing,
}

impl MediaType {
    /// Parse the dump spelling. Unknown labels yield `None` and the stream
    /// stays out of the media tallies.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "AUDIO" => Some(MediaType::Audio),
            "VIDEO" => Some(MediaType::Video),
            "SCREEN_SHARING" => Some(MediaType::ScreenSharing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Audio => "AUDIO",
            MediaType::Video => "VIDEO",
            MediaType::ScreenSharing => "SCREEN_SHARING",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Wire shapes of the search-engine export.

#[derive(Debug, Deserialize)]
struct Envelope {
    hits: HitList,
}

#[derive(Debug, Default, Deserialize)]
struct HitList {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: SourceRecord,
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    #[serde(default)]
    duration: i64,
    #[serde(rename = "rtcQosMediaType", default)]
    media_type: Option<String>,
    #[serde(rename = "qosItems", default)]
    qos_items: QosItems,
}

#[derive(Debug, Default, Deserialize)]
struct QosItems {
    #[serde(rename = "TB", default)]
    begin: i64,
    #[serde(rename = "TE", default)]
    end: i64,
    #[serde(rename = "OR", default)]
    octets_received: i64,
    #[serde(rename = "RID", default)]
    rtc_instance_id: Option<String>,
}

/// One media stream as reported by a QoS record.
#[derive(Debug, Clone)]
pub struct Stream {
    /// Stream begin, epoch milliseconds; 0 when the record omits it.
    pub begin: i64,
    /// Stream end, epoch milliseconds; 0 when the record omits it.
    pub end: i64,
    /// Reported stream duration in milliseconds.
    pub duration: i64,
    /// Octets received over the stream lifetime.
    pub octets_received: i64,
    /// Media classification; `None` when the dump carries an unknown label.
    pub media: Option<MediaType>,
    /// Owning RTC instance, when reported.
    pub rtc_instance_id: Option<String>,
}

impl From<SourceRecord> for Stream {
    fn from(source: SourceRecord) -> Self {
        Self {
            begin: source.qos_items.begin,
            end: source.qos_items.end,
            duration: source.duration,
            octets_received: source.qos_items.octets_received,
            media: source.media_type.as_deref().and_then(MediaType::parse),
            rtc_instance_id: source.qos_items.rtc_instance_id,
        }
    }
}

/// Parse every stream out of one dump's text.
pub fn parse_streams(text: &str, path: &Path) -> Result<Vec<Stream>, LoadError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(envelope
        .hits
        .hits
        .into_iter()
        .map(|hit| Stream::from(hit.source))
        .collect())
}

/// Load and parse every dump file, concatenating streams in file order.
pub fn load_streams(paths: &[PathBuf]) -> Result<Vec<Stream>, LoadError> {
    let mut streams = Vec::new();
    for path in paths {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut parsed = parse_streams(&text, path)?;
        debug!(file = %path.display(), streams = parsed.len(), "loaded dump");
        streams.append(&mut parsed);
    }
    Ok(streams)
}

/// Headline numbers over a loaded stream set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub streams: usize,
    /// Earliest non-zero stream begin.
    pub first_begin: Option<i64>,
    /// Latest non-zero stream end.
    pub last_end: Option<i64>,
    pub longest_ms: i64,
    pub rtc_instances: usize,
    pub max_streams_per_instance: usize,
}

pub fn summarize(streams: &[Stream]) -> StreamSummary {
    let mut summary = StreamSummary {
        streams: streams.len(),
        ..Default::default()
    };
    let mut per_instance: HashMap<&str, usize> = HashMap::new();

    for stream in streams {
        if stream.begin > 0 && summary.first_begin.map_or(true, |first| stream.begin < first) {
            summary.first_begin = Some(stream.begin);
        }
        if stream.end > 0 && summary.last_end.map_or(true, |last| stream.end > last) {
            summary.last_end = Some(stream.end);
        }
        summary.longest_ms = summary.longest_ms.max(stream.duration);
        if let Some(id) = stream.rtc_instance_id.as_deref() {
            *per_instance.entry(id).or_insert(0) += 1;
        }
    }

    summary.rtc_instances = per_instance.len();
    summary.max_streams_per_instance = per_instance.values().copied().max().unwrap_or(0);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dump() -> String {
        r#"{
            "hits": {
                "total": 3,
                "hits": [
                    { "_source": {
                        "rtcQosMediaType": "AUDIO",
                        "duration": 60000,
                        "qosItems": { "TB": 1000, "TE": 61000, "OR": 480000, "RID": "inst-1" }
                    } },
                    { "_source": {
                        "rtcQosMediaType": "VIDEO",
                        "duration": 45000,
                        "qosItems": { "TB": 2000, "TE": 47000, "OR": 960000, "RID": "inst-1" }
                    } },
                    { "_source": {
                        "rtcQosMediaType": "HOLOGRAM",
                        "duration": 10,
                        "qosItems": {}
                    } }
                ]
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_streams_maps_fields() {
        let streams = parse_streams(&create_test_dump(), Path::new("dump.json")).unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].begin, 1000);
        assert_eq!(streams[0].end, 61000);
        assert_eq!(streams[0].octets_received, 480000);
        assert_eq!(streams[0].media, Some(MediaType::Audio));
        assert_eq!(streams[0].rtc_instance_id.as_deref(), Some("inst-1"));
    }

    #[test]
    fn test_unknown_media_maps_to_none() {
        let streams = parse_streams(&create_test_dump(), Path::new("dump.json")).unwrap();
        assert_eq!(streams[2].media, None);
        assert_eq!(streams[2].begin, 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_streams("nope", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_summarize_tracks_window_and_instances() {
        let streams = parse_streams(&create_test_dump(), Path::new("dump.json")).unwrap();
        let summary = summarize(&streams);
        assert_eq!(summary.streams, 3);
        assert_eq!(summary.first_begin, Some(1000));
        assert_eq!(summary.last_end, Some(61000));
        assert_eq!(summary.longest_ms, 60000);
        assert_eq!(summary.rtc_instances, 1);
        assert_eq!(summary.max_streams_per_instance, 2);
    }

    #[test]
    fn test_summarize_empty_set() {
        let summary = summarize(&[]);
        assert_eq!(summary.first_begin, None);
        assert_eq!(summary.last_end, None);
        assert_eq!(summary.max_streams_per_instance, 0);
    }

    #[test]
    fn test_load_streams_missing_file() {
        let err = load_streams(&[PathBuf::from("/nonexistent/qos.json")]).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
