//! Durable export targets for samples.
//!
//! This module provides:
//! - `tabular`: CSV export, one row per sample
//! - `chart`: self-contained HTML document with memory and CPU line charts
//!
//! Sinks are built from a typed list of [`SinkSpec`] and then owned by the
//! [`ExtractorPipeline`](crate::pipeline::ExtractorPipeline), which is the only
//! caller of `add` and `finalize`.

pub mod chart;
pub mod tabular;

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SinkError;
use crate::sample::Sample;

pub use chart::ChartSink;
pub use tabular::CsvSink;

/// Kind of artifact a sink produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Tabular,
    Chart,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Tabular => write!(f, "csv"),
            SinkKind::Chart => write!(f, "html chart"),
        }
    }
}

/// Incremental consumer of samples producing one artifact on finalization.
///
/// `finalize` is called at most once; `add` is never called after it.
pub trait Sink: Send {
    fn add(&mut self, sample: Sample) -> Result<(), SinkError>;

    /// Writes the artifact, releases the file handle and resets buffered
    /// samples. The handle is released even when writing fails.
    fn finalize(&mut self) -> Result<(), SinkError>;

    fn kind(&self) -> SinkKind;

    fn path(&self) -> &Path;
}

/// Declarative description of a sink to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSpec {
    Tabular {
        path: PathBuf,
    },
    Chart {
        path: PathBuf,
        process_name: String,
        /// host:port of the live-update endpoint the document subscribes to.
        live_host: Option<String>,
    },
}

/// Builds sinks in the given order. Files are created here.
pub fn build_sinks(specs: &[SinkSpec], supports_swap: bool) -> Result<Vec<Box<dyn Sink>>, SinkError> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(specs.len());

    for spec in specs {
        match spec {
            SinkSpec::Tabular { path } => {
                debug!("Creating csv sink at {}", path.display());
                sinks.push(Box::new(CsvSink::create(path, supports_swap)?));
            }
            SinkSpec::Chart {
                path,
                process_name,
                live_host,
            } => {
                debug!("Creating chart sink at {}", path.display());
                sinks.push(Box::new(ChartSink::create(
                    path,
                    process_name,
                    live_host.clone(),
                    supports_swap,
                )?));
            }
        }
    }

    Ok(sinks)
}
