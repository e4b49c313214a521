//! Running maximum of resident memory over a run.

use crate::sample::Sample;

/// Tracks the highest RSS seen so far, in kilobytes.
///
/// Owned by the sampler task; read once when the run stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeakTracker {
    peak_kb: i64,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: &Sample) {
        if sample.rss_kb() > self.peak_kb {
            self.peak_kb = sample.rss_kb();
        }
    }

    pub fn peak_kb(&self) -> i64 {
        self.peak_kb
    }

    /// Peak in whole megabytes, as printed in the run summary.
    pub fn peak_mb(&self) -> i64 {
        self.peak_kb / 1024
    }
}
