//! Periodic sampling of the target process.
//!
//! The sampler is the single producer of the run: every tick it reads one
//! sample, updates the peak, hands the sample to the sinks and, when live
//! viewers are enabled, to the broker. It is also the only place that
//! finalizes the sinks, exactly once, after its loop ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::BrokerHandle;
use crate::console::OutputMode;
use crate::error::{BrokerError, ConfigError, SinkError, SourceError};
use crate::peak::PeakTracker;
use crate::pipeline::ExtractorPipeline;
use crate::process::StatsSource;
use crate::sample::Sample;
use crate::sink::SinkKind;

/// Outcome of one sampling run.
#[derive(Debug)]
pub struct SamplerReport {
    pub peak: PeakTracker,
    pub samples: u64,
    /// Set when the run was ended by a failing stats read.
    pub source_error: Option<SourceError>,
    /// Result of finalizing the sinks, with the written artifacts on success.
    pub export: Result<Vec<(SinkKind, PathBuf)>, SinkError>,
}

pub struct Sampler {
    source: Arc<dyn StatsSource>,
    pid: u32,
    interval: Duration,
    pipeline: ExtractorPipeline,
    peak: PeakTracker,
    broker: Option<BrokerHandle>,
    output: OutputMode,
}

impl Sampler {
    pub fn new(
        source: Arc<dyn StatsSource>,
        pid: u32,
        interval: Duration,
        pipeline: ExtractorPipeline,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            source,
            pid,
            interval,
            pipeline,
            peak: PeakTracker::new(),
            broker: None,
            output: OutputMode::None,
        })
    }

    /// Publishes every sample to live viewers through `broker`.
    pub fn with_broker(mut self, broker: BrokerHandle) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Samples until `token` is cancelled or the stats source fails, then
    /// finalizes the sinks.
    ///
    /// A source failure cancels `token` so the rest of the run stops too.
    #[instrument(skip_all, fields(pid = self.pid, interval = ?self.interval))]
    pub async fn run(mut self, token: CancellationToken) -> SamplerReport {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if let Some(header) = self.output.header() {
            println!("{header}");
        }

        let mut samples = 0u64;
        let mut source_error = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let read = read_sample(Arc::clone(&self.source), self.pid);
            let sample = match read.await {
                Ok(sample) => sample,
                Err(e) => {
                    match &e {
                        SourceError::ProcessGone { .. } => info!("Process {} exited", self.pid),
                        _ => error!("Failed to read stats for pid {}: {}", self.pid, e),
                    }
                    source_error = Some(e);
                    token.cancel();
                    break;
                }
            };

            samples += 1;
            self.handle_sample(sample);
        }

        info!(samples, "Sampling stopped, finalizing sinks");
        let export = self.pipeline.finalize_all();
        if let Err(e) = &export {
            error!("Failed to finalize sinks: {}", e);
        }

        SamplerReport {
            peak: self.peak,
            samples,
            source_error,
            export,
        }
    }

    fn handle_sample(&mut self, sample: Sample) {
        self.peak.observe(&sample);

        if let Err(e) = self.pipeline.add(sample) {
            warn!("Error while extracting sample: {}", e);
        }

        if let Some(line) = self.output.line(&sample) {
            println!("{line}");
        }

        let Some(broker) = &self.broker else {
            return;
        };
        let payload = match sample.to_json() {
            Ok(json) => Arc::<str>::from(json),
            Err(e) => {
                warn!("Failed to serialize sample for live viewers: {}", e);
                return;
            }
        };
        match broker.try_publish(payload) {
            Ok(()) => {}
            Err(BrokerError::InboxFull) => {
                warn!("Live broker inbox full, dropping sample for viewers");
            }
            Err(BrokerError::Closed) => {
                debug!("Live broker stopped, no longer publishing");
                self.broker = None;
            }
        }
    }
}

/// Reads one sample on the blocking pool. Takes owned arguments so the
/// sampler itself is never borrowed across the await.
async fn read_sample(source: Arc<dyn StatsSource>, pid: u32) -> Result<Sample, SourceError> {
    tokio::task::spawn_blocking(move || source.get_stats(pid))
        .await
        .unwrap_or_else(|e| Err(SourceError::Worker(e.to_string())))
}
