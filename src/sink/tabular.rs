//! CSV export of samples.

use chrono::SecondsFormat;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{Sink, SinkKind};
use crate::error::SinkError;
use crate::sample::Sample;

pub const HEADER_WITH_SWAP: [&str; 4] = ["timestamp", "rss kb", "rss+swap kb", "cpu%"];
pub const HEADER_WITHOUT_SWAP: [&str; 3] = ["timestamp", "rss kb", "cpu%"];

/// Writes one CSV row per sample; the file is created (truncated) at construction.
pub struct CsvSink {
    path: PathBuf,
    with_swap: bool,
    writer: Option<csv::Writer<File>>,
    rows: Vec<Sample>,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>, with_swap: bool) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| SinkError::Create {
            path: path.clone(),
            source,
        })?;

        let mut writer = csv::Writer::from_writer(file);
        let header: &[&str] = if with_swap {
            &HEADER_WITH_SWAP
        } else {
            &HEADER_WITHOUT_SWAP
        };
        writer.write_record(header).map_err(|source| SinkError::Csv {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            with_swap,
            writer: Some(writer),
            rows: Vec::new(),
        })
    }

    /// Samples added since construction or the last finalize.
    pub fn rows(&self) -> &[Sample] {
        &self.rows
    }
}

/// Formats a sample as a CSV record.
pub fn to_record(sample: &Sample, with_swap: bool) -> Vec<String> {
    let timestamp = sample
        .captured_at
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let rss = sample.rss_kb().to_string();
    let cpu = format!("{:.1}", sample.cpu_percent());

    if with_swap {
        vec![timestamp, rss, sample.rss_swap_kb().to_string(), cpu]
    } else {
        vec![timestamp, rss, cpu]
    }
}

impl Sink for CsvSink {
    fn add(&mut self, sample: Sample) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::Finalized(self.path.clone()))?;

        writer
            .write_record(to_record(&sample, self.with_swap))
            .map_err(|source| SinkError::Csv {
                path: self.path.clone(),
                source,
            })?;
        self.rows.push(sample);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| SinkError::Finalized(self.path.clone()))?;
        self.rows.clear();

        // The writer (and its file) is dropped on every return path below
        writer.flush().map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })?;
        let file = writer.into_inner().map_err(|e| SinkError::Write {
            path: self.path.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Tabular
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
