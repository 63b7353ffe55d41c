//! QoS Report Service
//!
//! Concurrency and bandwidth reporting for the Callscope call-quality
//! analytics toolkit. Works directly on search-engine QoS dumps, no
//! database involved: streams are loaded into memory, an analysis window is
//! resolved, and every one-minute bucket is scanned for active streams.
//!
//! # Pipeline
//!
//! ```text
//! QoS dumps -> Stream loader -> Window resolver -> Bucket sampler -> CSV + charts
//! ```
//!
//! The output is a per-minute CSV (`Date, Audio, Video, ScreenShare,
//! Bandwidth`) plus terminal bar charts of the hourly peak series.

pub mod chart;
pub mod config;
pub mod qos;
pub mod report;
pub mod window;

pub use chart::ChartGeometry;
pub use config::{ConfigValidationError, ReportConfig};
pub use qos::{LoadError, MediaType, Stream, StreamSummary};
pub use report::CSV_HEADER;
pub use window::{
    AnalysisWindow, ConcurrencySample, HourlyPeaks, SampledWindow, WindowError,
    MIN_STREAM_DURATION_MS, SAMPLE_INTERVAL_MS,
};
