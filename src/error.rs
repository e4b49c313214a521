//! Error types for the sampling pipeline.
//!
//! Each failure class has its own enum so callers can decide whether it is
//! fatal for the run, for one sink, or only worth a log line.

use std::path::PathBuf;
use std::time::Duration;

/// Reading stats for the target process failed. Always fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("process {pid} is no longer running")]
    ProcessGone { pid: u32 },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what} for pid {pid}: {detail}")]
    Parse {
        pid: u32,
        what: &'static str,
        detail: String,
    },

    #[error("failed to run `{command}`: {detail}")]
    Command { command: String, detail: String },

    #[error("stats worker panicked: {0}")]
    Worker(String),
}

/// A sink failed to accept a sample or to produce its artifact.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write csv row to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("sink {0} was already finalized")]
    Finalized(PathBuf),
}

/// The live-update HTTP transport failed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to resolve live host '{host}': {detail}")]
    Resolve { host: String, detail: String },

    #[error("failed to bind live server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("live server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("live server did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// The live broker can no longer accept commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("live broker has stopped")]
    Closed,

    #[error("live broker inbox is full")]
    InboxFull,
}

/// Invalid configuration, rejected before any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("refresh interval must be greater than zero")]
    ZeroInterval,

    #[error("a PID or a command should be specified")]
    MissingTarget,

    #[error("--pid and --cmd are mutually exclusive")]
    ConflictingTarget,

    #[error("process {0} does not exist")]
    NoSuchProcess(u32),

    #[error("process {0} has no parent")]
    NoParent(u32),

    #[error("--parent is currently supported only on Linux")]
    ParentUnsupported,

    #[error("invalid refresh interval: {0}")]
    InvalidRefresh(String),

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("invalid live host '{0}', expected host:port")]
    InvalidLiveHost(String),

    #[error("invalid output mode '{0}', expected 'csv', 'pretty' or 'none'")]
    InvalidOutput(String),

    #[error("{field} must be greater than zero")]
    ZeroCapacity { field: &'static str },

    #[error("failed to load config file {path}: {detail}")]
    File { path: PathBuf, detail: String },
}

/// Starting the monitored command failed.
#[derive(Debug, thiserror::Error)]
pub enum ChildError {
    #[error("command line is empty")]
    EmptyCommand,

    #[error("failed to start command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned command has no pid (already reaped)")]
    NoPid,
}

/// Errors that prevent a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Child(#[from] ChildError),

    #[error("sampler task failed: {0}")]
    SamplerTask(String),
}
