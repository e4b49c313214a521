//! peekprof process profiler library
//!
//! This library samples the memory and CPU usage of one process at a fixed
//! interval, fans every sample out to durable sinks (CSV, HTML chart) and,
//! optionally, streams it to live viewers over server-sent events.
//!
//! # Features
//!
//! - **Platform stats sources**: `/proc` on Linux (children summed in), `ps` elsewhere on Unix
//! - **Ordered fan-out**: sinks receive samples in production order and are finalized once
//! - **Live viewers**: a single-task broker feeding `GET /process/updates`
//! - **Coordinated shutdown**: one cancellation token, bounded transport drain
//!
//! # Usage
//!
//! ```rust
//! use chrono::Local;
//! use peekprof::{PeakTracker, Sample};
//!
//! let mut peak = PeakTracker::new();
//! peak.observe(&Sample::new(4096, 4096, 1.5, Local::now()));
//! peak.observe(&Sample::new(2048, 2048, 0.5, Local::now()));
//!
//! assert_eq!(peak.peak_kb(), 4096);
//! assert_eq!(peak.peak_mb(), 4);
//! ```

pub mod broker;
pub mod child;
pub mod console;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod peak;
pub mod pipeline;
pub mod process;
pub mod sample;
pub mod sampler;
pub mod server;
pub mod sink;

// Re-export main types for convenience
pub use broker::{BrokerHandle, LiveBroker, Subscription};
pub use coordinator::{spawn_run, LifecycleCoordinator, Phase, RunOptions, RunSummary, Target};
pub use peak::PeakTracker;
pub use pipeline::ExtractorPipeline;
pub use process::StatsSource;
pub use sample::Sample;
pub use sampler::{Sampler, SamplerReport};
pub use sink::{Sink, SinkKind, SinkSpec};
