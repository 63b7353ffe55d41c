//! Day-by-day dump splitting.

use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("input file {0} has no usable name stem")]
    NoStem(String),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Outcome counters for one split input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Day files created.
    pub days: usize,
    /// Content lines written across all day files.
    pub lines: usize,
    /// Lines dropped: separator lines after markers plus any content before
    /// the first marker.
    pub skipped: usize,
}

/// Splits a concatenated multi-day dump into one file per day.
///
/// A day starts at a line holding only a `YYYY-MM-DD` date. The line
/// directly after the marker is a separator and is dropped. Everything else
/// goes verbatim into `<stem>-<date>.json` next to the input, or under an
/// explicit output directory.
pub struct DaySplitter {
    date_line: Regex,
    out_dir: Option<PathBuf>,
}

impl DaySplitter {
    pub fn new(out_dir: Option<PathBuf>) -> Result<Self, SplitError> {
        Ok(Self {
            date_line: Regex::new(r"^\d{4}-\d{2}-\d{2}$")?,
            out_dir,
        })
    }

    pub fn split_file(&self, input: &Path) -> Result<SplitStats, SplitError> {
        let read_err = |source| SplitError::Read {
            path: input.display().to_string(),
            source,
        };
        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| SplitError::NoStem(input.display().to_string()))?;
        let dir = match &self.out_dir {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let reader = BufReader::new(File::open(input).map_err(read_err)?);

        let mut stats = SplitStats::default();
        let mut current: Option<(PathBuf, BufWriter<File>)> = None;
        let mut skip_next = false;
        let mut warned_preamble = false;

        for line in reader.lines() {
            let line = line.map_err(read_err)?;

            if skip_next {
                skip_next = false;
                stats.skipped += 1;
                continue;
            }
            if self.date_line.is_match(&line) {
                finish(&mut current)?;
                let path = dir.join(format!("{stem}-{line}.json"));
                debug!(day = %line, file = %path.display(), "opening day file");
                let out = File::create(&path).map_err(|source| write_err(&path, source))?;
                current = Some((path, BufWriter::new(out)));
                skip_next = true;
                stats.days += 1;
                continue;
            }

            match current.as_mut() {
                Some((path, out)) => {
                    writeln!(out, "{line}").map_err(|source| write_err(path, source))?;
                    stats.lines += 1;
                }
                None => {
                    if !warned_preamble {
                        warn!(
                            file = %input.display(),
                            "content before the first date marker, dropping"
                        );
                        warned_preamble = true;
                    }
                    stats.skipped += 1;
                }
            }
        }
        finish(&mut current)?;
        Ok(stats)
    }
}

fn finish(current: &mut Option<(PathBuf, BufWriter<File>)>) -> Result<(), SplitError> {
    if let Some((path, mut out)) = current.take() {
        out.flush().map_err(|source| write_err(&path, source))?;
    }
    Ok(())
}

fn write_err(path: &Path, source: std::io::Error) -> SplitError {
    SplitError::Write {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_input(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("qos_values.txt");
        let text = "preamble noise\n\
                    2017-08-02\n\
                    separator\n\
                    {\"hits\":1}\n\
                    {\"hits\":2}\n\
                    2017-08-03\n\
                    separator\n\
                    {\"hits\":3}\n";
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_split_creates_one_file_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir);
        let splitter = DaySplitter::new(None).unwrap();
        let stats = splitter.split_file(&input).unwrap();

        assert_eq!(
            stats,
            SplitStats {
                days: 2,
                lines: 3,
                skipped: 3
            }
        );

        let day1 = fs::read_to_string(dir.path().join("qos_values-2017-08-02.json")).unwrap();
        assert_eq!(day1, "{\"hits\":1}\n{\"hits\":2}\n");
        let day2 = fs::read_to_string(dir.path().join("qos_values-2017-08-03.json")).unwrap();
        assert_eq!(day2, "{\"hits\":3}\n");
    }

    #[test]
    fn test_out_dir_redirects_day_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let input = write_input(&dir);
        let splitter = DaySplitter::new(Some(out.path().to_path_buf())).unwrap();
        splitter.split_file(&input).unwrap();

        assert!(out.path().join("qos_values-2017-08-02.json").exists());
        assert!(!dir.path().join("qos_values-2017-08-02.json").exists());
    }

    #[test]
    fn test_missing_input_is_read_error() {
        let splitter = DaySplitter::new(None).unwrap();
        let err = splitter
            .split_file(Path::new("/nonexistent/dump.txt"))
            .unwrap_err();
        assert!(matches!(err, SplitError::Read { .. }));
    }

    #[test]
    fn test_marker_must_fill_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        fs::write(&path, "2017-08-02 plus trailing\n2017-08-02\nsep\ndata\n").unwrap();
        let splitter = DaySplitter::new(None).unwrap();
        let stats = splitter.split_file(&path).unwrap();

        assert_eq!(stats.days, 1);
        assert_eq!(stats.lines, 1);
        assert_eq!(stats.skipped, 2);
    }
}
