//! Ordered fan-out of samples to every configured sink.

use std::path::PathBuf;
use tracing::debug;

use crate::error::SinkError;
use crate::sample::Sample;
use crate::sink::{Sink, SinkKind};

/// Owns the sinks of a run and delivers samples to them in order.
///
/// Fan-out is fail-fast: the first sink error aborts delivery of that sample
/// to the remaining sinks and is returned to the caller.
pub struct ExtractorPipeline {
    sinks: Vec<Box<dyn Sink>>,
}

impl ExtractorPipeline {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Artifacts this pipeline produces, in sink order.
    pub fn artifacts(&self) -> Vec<(SinkKind, PathBuf)> {
        self.sinks
            .iter()
            .map(|s| (s.kind(), s.path().to_path_buf()))
            .collect()
    }

    pub fn add(&mut self, sample: Sample) -> Result<(), SinkError> {
        for sink in self.sinks.iter_mut() {
            sink.add(sample)?;
        }
        Ok(())
    }

    /// Finalizes sinks in order, stopping at the first failure.
    ///
    /// On success returns the produced artifacts.
    pub fn finalize_all(&mut self) -> Result<Vec<(SinkKind, PathBuf)>, SinkError> {
        let mut written = Vec::with_capacity(self.sinks.len());
        for sink in self.sinks.iter_mut() {
            sink.finalize()?;
            debug!("Finalized {} sink at {}", sink.kind(), sink.path().display());
            written.push((sink.kind(), sink.path().to_path_buf()));
        }
        Ok(written)
    }
}
