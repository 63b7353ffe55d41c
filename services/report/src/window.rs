//! Time-bucketed concurrency analysis.
//!
//! The window is cut into one-minute buckets aligned to the window begin
//! truncated to the bucket size. Every bucket scans every stream, so the
//! pass is O(buckets x streams); batch sizes are minutes to hours of call
//! data, which keeps that affordable without an index.

use crate::qos::{self, MediaType, Stream};
use thiserror::Error;
use tracing::debug;

/// Width of one concurrency sample bucket.
pub const SAMPLE_INTERVAL_MS: i64 = 60_000;
/// Streams at or below this duration are treated as connection noise.
pub const MIN_STREAM_DURATION_MS: i64 = 10_000;
const HOUR_MS: i64 = 3_600_000;

// Per-stream bandwidth estimates in kbit/s.
const AUDIO_KBPS: u32 = 64; // opus
const VIDEO_KBPS: u32 = 256; // vp8 video
const SCREEN_SHARE_KBPS: u32 = 120; // vp8 screen share

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("no stream carries a usable time range and no explicit window was given")]
    Empty,

    #[error("analysis window is empty or inverted: begin {begin} >= end {end}")]
    Inverted { begin: i64, end: i64 },

    #[error("bucket {bucket} maps to hour {hour} outside 0..{hours}")]
    HourOutOfRange {
        bucket: i64,
        hour: i64,
        hours: usize,
    },
}

/// Analysis window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub begin: i64,
    pub end: i64,
}

impl AnalysisWindow {
    /// Resolve the window from explicit bounds, falling back to the observed
    /// stream extent. An empty or inverted window is fatal.
    pub fn resolve(
        streams: &[Stream],
        from: Option<i64>,
        to: Option<i64>,
    ) -> Result<Self, WindowError> {
        let summary = qos::summarize(streams);
        let begin = from.or(summary.first_begin).ok_or(WindowError::Empty)?;
        let end = to.or(summary.last_end).ok_or(WindowError::Empty)?;
        if end <= begin {
            return Err(WindowError::Inverted { begin, end });
        }
        Ok(Self { begin, end })
    }

    /// First bucket time: the window begin truncated to the bucket size.
    pub fn bucket_start(&self) -> i64 {
        self.begin - self.begin.rem_euclid(SAMPLE_INTERVAL_MS)
    }

    /// Number of sample buckets covering the window.
    pub fn samples(&self) -> usize {
        ((self.end - self.begin) as u64).div_ceil(SAMPLE_INTERVAL_MS as u64) as usize
    }

    /// Number of hour slots the sample range spans.
    pub fn hours(&self) -> usize {
        self.samples().div_ceil(60)
    }
}

/// Concurrency counts for one sample bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcurrencySample {
    /// Bucket time, epoch milliseconds.
    pub bucket: i64,
    pub audio: u32,
    pub video: u32,
    pub screen_share: u32,
    /// Estimated downstream bandwidth in Mbit/s, rounded up to one decimal.
    pub bandwidth_mbps: f64,
}

/// Peak per-hour values per metric, as (hour index, peak) series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyPeaks {
    pub audio: Vec<(i64, f64)>,
    pub video: Vec<(i64, f64)>,
    pub screen_share: Vec<(i64, f64)>,
    pub bandwidth: Vec<(i64, f64)>,
}

impl HourlyPeaks {
    fn new(hours: usize) -> Self {
        let zeroed: Vec<(i64, f64)> = (0..hours as i64).map(|hour| (hour, 0.0)).collect();
        Self {
            audio: zeroed.clone(),
            video: zeroed.clone(),
            screen_share: zeroed.clone(),
            bandwidth: zeroed,
        }
    }

    fn update(&mut self, hour: usize, sample: &ConcurrencySample) {
        update_peak(&mut self.audio, hour, f64::from(sample.audio));
        update_peak(&mut self.video, hour, f64::from(sample.video));
        update_peak(&mut self.screen_share, hour, f64::from(sample.screen_share));
        update_peak(&mut self.bandwidth, hour, sample.bandwidth_mbps);
    }
}

fn update_peak(series: &mut [(i64, f64)], hour: usize, value: f64) {
    if value > series[hour].1 {
        series[hour].1 = value;
    }
}

/// One full pass over the window: per-bucket samples plus hourly peaks.
#[derive(Debug, Clone, Default)]
pub struct SampledWindow {
    pub samples: Vec<ConcurrencySample>,
    pub peaks: HourlyPeaks,
}

/// A stream counts toward a bucket when it spans the bucket time, exceeds
/// the noise floor, and actually received data. Streams starting exactly on
/// the bucket time count; streams ending on it do not. Only the downstream
/// indicator is consulted, upstream volume is deliberately ignored.
pub fn stream_active(stream: &Stream, at: i64) -> bool {
    stream.begin <= at
        && stream.end > at
        && stream.duration > MIN_STREAM_DURATION_MS
        && stream.octets_received > 0
}

/// Scan every stream for every bucket of the window.
pub fn sample(streams: &[Stream], window: &AnalysisWindow) -> Result<SampledWindow, WindowError> {
    let samples = window.samples();
    let hours = window.hours();
    let start = window.bucket_start();
    debug!(samples, hours, start, "sampling window");

    let mut out = SampledWindow {
        samples: Vec::with_capacity(samples),
        peaks: HourlyPeaks::new(hours),
    };

    for i in 0..samples {
        let offset = i as i64 * SAMPLE_INTERVAL_MS;
        let bucket = start + offset;
        let hour = (offset / HOUR_MS) as usize;
        if hour >= hours {
            return Err(WindowError::HourOutOfRange {
                bucket,
                hour: hour as i64,
                hours,
            });
        }

        let mut sample = ConcurrencySample {
            bucket,
            audio: 0,
            video: 0,
            screen_share: 0,
            bandwidth_mbps: 0.0,
        };
        for stream in streams {
            if !stream_active(stream, bucket) {
                continue;
            }
            match stream.media {
                Some(MediaType::Audio) => sample.audio += 1,
                Some(MediaType::Video) => sample.video += 1,
                Some(MediaType::ScreenSharing) => sample.screen_share += 1,
                None => {}
            }
        }
        sample.bandwidth_mbps =
            estimate_bandwidth_mbps(sample.audio, sample.video, sample.screen_share);

        out.peaks.update(hour, &sample);
        out.samples.push(sample);
    }
    Ok(out)
}

/// Estimated downstream bandwidth for one bucket, in Mbit/s rounded up to
/// one decimal place.
fn estimate_bandwidth_mbps(audio: u32, video: u32, screen_share: u32) -> f64 {
    let kbps = audio * AUDIO_KBPS + video * VIDEO_KBPS + screen_share * SCREEN_SHARE_KBPS;
    let tenths = kbps.div_ceil(100);
    f64::from(tenths) / 10.0
}
