//! Run lifecycle: startup, cancellation and ordered shutdown.
//!
//! A run moves through `Starting → Running → Draining → Stopped`. One shared
//! [`CancellationToken`] ends it; the interrupt listener, the child waiter,
//! the live server and a failing stats source may each cancel it, and the
//! first cancellation wins.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::broker::LiveBroker;
use crate::child::MonitoredChild;
use crate::console::OutputMode;
use crate::error::{ConfigError, RunError, SinkError, SourceError};
use crate::peak::PeakTracker;
use crate::pipeline::ExtractorPipeline;
use crate::process::StatsSource;
use crate::sampler::{Sampler, SamplerReport};
use crate::server::{start_server, ServerHandle};
use crate::sink::{build_sinks, SinkKind, SinkSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What is being monitored.
pub enum Target {
    /// An already running process.
    Pid(u32),
    /// A command started by the profiler; its exit ends the run.
    Child(MonitoredChild),
}

impl Target {
    pub fn pid(&self) -> u32 {
        match self {
            Target::Pid(pid) => *pid,
            Target::Child(child) => child.pid(),
        }
    }
}

/// Settings of one run, resolved from configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub interval: Duration,
    pub sinks: Vec<SinkSpec>,
    /// Host of the live-update server; `None` disables live viewers.
    pub live_host: Option<String>,
    pub shutdown_timeout: Duration,
    pub broker_queue_depth: usize,
    pub subscriber_buffer: usize,
    pub output: OutputMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            sinks: Vec::new(),
            live_host: None,
            shutdown_timeout: Duration::from_secs(15),
            broker_queue_depth: 64,
            subscriber_buffer: 16,
            output: OutputMode::None,
        }
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub peak: PeakTracker,
    pub elapsed: Duration,
    pub samples: u64,
    pub export: Result<Vec<(SinkKind, PathBuf)>, SinkError>,
    pub source_error: Option<SourceError>,
    /// Address the live server was bound to, if it ran.
    pub live_addr: Option<SocketAddr>,
}

impl RunSummary {
    /// True when the artifacts were written and the run was not ended by a
    /// failing stats read. The target exiting is a normal end.
    pub fn is_success(&self) -> bool {
        let source_ok = matches!(
            self.source_error,
            None | Some(SourceError::ProcessGone { .. })
        );
        self.export.is_ok() && source_ok
    }
}

pub struct LifecycleCoordinator {
    phase: Phase,
    token: CancellationToken,
    started: Instant,
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Uses an externally owned token, e.g. to stop the run from a test.
    pub fn with_token(token: CancellationToken) -> Self {
        info!("Run phase: {}", Phase::Starting);
        Self {
            phase: Phase::Starting,
            token,
            started: Instant::now(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        info!("Run phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Runs one profiling session to completion.
    ///
    /// Startup errors (invalid options, sink creation, server bind) are
    /// returned before sampling starts. Once running, the outcome is
    /// reported through [`RunSummary`].
    #[instrument(skip_all, fields(pid = target.pid()))]
    pub async fn run(
        mut self,
        source: Arc<dyn StatsSource>,
        target: Target,
        options: RunOptions,
    ) -> Result<RunSummary, RunError> {
        if options.broker_queue_depth == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "broker_queue_depth",
            }
            .into());
        }
        if options.subscriber_buffer == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "subscriber_buffer",
            }
            .into());
        }

        let pid = target.pid();
        let sinks = build_sinks(&options.sinks, source.supports_swap())?;
        let pipeline = ExtractorPipeline::new(sinks);
        let mut sampler =
            Sampler::new(source, pid, options.interval, pipeline)?.with_output(options.output);

        let mut broker_task = None;
        let mut server: Option<ServerHandle> = None;
        if let Some(host) = options.live_host.as_deref() {
            let (broker, task) = LiveBroker::spawn(
                options.broker_queue_depth,
                options.subscriber_buffer,
                self.token.clone(),
            );
            match start_server(host, broker.clone(), self.token.clone()).await {
                Ok(handle) => server = Some(handle),
                Err(e) => {
                    self.token.cancel();
                    return Err(e.into());
                }
            }
            sampler = sampler.with_broker(broker);
            broker_task = Some(task);
        }
        let live_addr = server.as_ref().map(ServerHandle::local_addr);

        let signals = tokio::spawn(listen_for_signals(self.token.clone()));
        let waiter = match target {
            Target::Child(child) => Some(tokio::spawn(wait_for_child(child, self.token.clone()))),
            Target::Pid(_) => None,
        };

        self.transition(Phase::Running);
        let sampling = spawn_sampler(sampler, self.token.clone());
        self.token.cancelled().await;

        self.transition(Phase::Draining);
        if let Some(server) = server {
            if let Err(e) = server.drain(options.shutdown_timeout).await {
                warn!("Live server shutdown: {}", e);
            }
        }
        let report = sampling
            .await
            .map_err(|e| RunError::SamplerTask(e.to_string()))?;
        if let Some(task) = broker_task {
            let _ = task.await;
        }
        signals.abort();
        if let Some(waiter) = waiter {
            let _ = waiter.await;
        }

        self.transition(Phase::Stopped);
        Ok(RunSummary {
            peak: report.peak,
            elapsed: self.started.elapsed(),
            samples: report.samples,
            export: report.export,
            source_error: report.source_error,
            live_addr,
        })
    }
}

/// Runs the sampler on its own task. The token is cancelled when the task
/// ends for any reason, including a panic.
fn spawn_sampler(sampler: Sampler, token: CancellationToken) -> JoinHandle<SamplerReport> {
    tokio::spawn(async move {
        let _guard = token.clone().drop_guard();
        sampler.run(token).await
    })
}

/// Cancels `token` on SIGINT, or SIGTERM on Unix.
async fn listen_for_signals(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
        _ = token.cancelled() => return,
    }
    token.cancel();
}

/// Cancels `token` once the monitored command exits.
async fn wait_for_child(mut child: MonitoredChild, token: CancellationToken) {
    let pid = child.pid();
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => info!(pid, "Command exited with {}", status),
                Err(e) => warn!(pid, "Failed waiting for command: {}", e),
            }
            token.cancel();
        }
        _ = token.cancelled() => {
            debug!(pid, "Run stopped before command exited");
        }
    }
}

/// Spawns [`LifecycleCoordinator::run`] on a new task with a fresh coordinator.
pub fn spawn_run(
    source: Arc<dyn StatsSource>,
    target: Target,
    options: RunOptions,
) -> (CancellationToken, JoinHandle<Result<RunSummary, RunError>>) {
    let coordinator = LifecycleCoordinator::new();
    let token = coordinator.token();
    let task = tokio::spawn(coordinator.run(source, target, options));
    (token, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use crate::sink::Sink;
    use chrono::Local;

    struct Fixed;

    impl StatsSource for Fixed {
        fn get_stats(&self, _pid: u32) -> Result<Sample, SourceError> {
            Ok(Sample::new(2048, 2048, 0.0, Local::now()))
        }

        fn process_name(&self, _pid: u32) -> Option<String> {
            Some("fixed".into())
        }

        fn parent_pid(&self, _pid: u32) -> Result<Option<u32>, SourceError> {
            Ok(None)
        }
    }

    struct Exploding;

    impl Sink for Exploding {
        fn add(&mut self, _sample: Sample) -> Result<(), SinkError> {
            panic!("sink blew up");
        }

        fn finalize(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        fn kind(&self) -> SinkKind {
            SinkKind::Tabular
        }

        fn path(&self) -> &std::path::Path {
            std::path::Path::new("exploding.csv")
        }
    }

    #[tokio::test]
    async fn test_sampler_panic_cancels_run() {
        let pipeline = ExtractorPipeline::new(vec![Box::new(Exploding)]);
        let sampler =
            Sampler::new(Arc::new(Fixed), 1, Duration::from_millis(10), pipeline).unwrap();
        let token = CancellationToken::new();

        let task = spawn_sampler(sampler, token.clone());
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("panic in the sampler cancels the run");
        assert!(task.await.unwrap_err().is_panic());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Draining.to_string(), "draining");
        assert_eq!(LifecycleCoordinator::new().phase(), Phase::Starting);
    }

    #[tokio::test]
    async fn test_cancel_stops_run() {
        let options = RunOptions {
            interval: Duration::from_millis(10),
            ..RunOptions::default()
        };
        let (token, task) = spawn_run(Arc::new(Fixed), Target::Pid(1), options);

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let summary = task.await.unwrap().unwrap();
        assert!(summary.samples >= 1);
        assert_eq!(summary.peak.peak_mb(), 2);
        assert!(summary.is_success());
        assert!(summary.live_addr.is_none());
    }

    #[tokio::test]
    async fn test_zero_interval_is_config_error() {
        let options = RunOptions {
            interval: Duration::ZERO,
            ..RunOptions::default()
        };
        let result = LifecycleCoordinator::new()
            .run(Arc::new(Fixed), Target::Pid(1), options)
            .await;
        assert!(matches!(result, Err(RunError::Config(ConfigError::ZeroInterval))));
    }

    #[tokio::test]
    async fn test_zero_subscriber_buffer_is_config_error() {
        let options = RunOptions {
            subscriber_buffer: 0,
            ..RunOptions::default()
        };
        let result = LifecycleCoordinator::new()
            .run(Arc::new(Fixed), Target::Pid(1), options)
            .await;
        assert!(matches!(
            result,
            Err(RunError::Config(ConfigError::ZeroCapacity { .. }))
        ));
    }
}
