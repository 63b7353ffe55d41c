//! CSV report output.

use crate::window::ConcurrencySample;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column header of the per-minute report.
pub const CSV_HEADER: &str = "Date, Audio, Video, ScreenShare, Bandwidth";

/// HTTP-style UTC date with the comma dropped,
/// e.g. `Wed 02 Aug 2017 14:03:22 GMT`.
pub fn format_bucket_date(bucket_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(bucket_ms) {
        Some(at) => at.format("%a %d %b %Y %H:%M:%S GMT").to_string(),
        None => bucket_ms.to_string(),
    }
}

/// One CSV line for a sample, without the trailing newline.
pub fn format_row(sample: &ConcurrencySample) -> String {
    format!(
        "{},{},{},{},{:.1}",
        format_bucket_date(sample.bucket),
        sample.audio,
        sample.video,
        sample.screen_share,
        sample.bandwidth_mbps
    )
}

/// Write the full per-bucket report.
pub fn write_csv(path: &Path, samples: &[ConcurrencySample]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{CSV_HEADER}")?;
    for sample in samples {
        writeln!(out, "{}", format_row(sample))?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_sample() -> ConcurrencySample {
        ConcurrencySample {
            bucket: 1_501_682_602_000,
            audio: 2,
            video: 1,
            screen_share: 0,
            bandwidth_mbps: 0.4,
        }
    }

    #[test]
    fn test_date_is_http_style_without_comma() {
        assert_eq!(format_bucket_date(0), "Thu 01 Jan 1970 00:00:00 GMT");
        assert_eq!(
            format_bucket_date(1_501_682_602_000),
            "Wed 02 Aug 2017 14:03:22 GMT"
        );
    }

    #[test]
    fn test_row_format() {
        assert_eq!(
            format_row(&create_test_sample()),
            "Wed 02 Aug 2017 14:03:22 GMT,2,1,0,0.4"
        );
    }

    #[test]
    fn test_write_csv_emits_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        write_csv(&path, &[create_test_sample()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",0.4"));
    }

    #[test]
    fn test_write_csv_empty_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        write_csv(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{CSV_HEADER}\n"));
    }
}
