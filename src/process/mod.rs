//! Stats sources for the monitored process.
//!
//! This module provides:
//! - `memory`: RSS/swap parsing from /proc/<pid>/smaps
//! - `cpu`: CPU time parsing and delta-based usage
//! - `scanner`: names, parents and children of a PID
//! - `procfs`: the Linux `StatsSource`
//! - `ps`: the portable Unix `StatsSource`

pub mod cpu;
pub mod memory;
pub mod procfs;
pub mod ps;
pub mod scanner;

use std::sync::Arc;

use crate::error::SourceError;
use crate::sample::Sample;

pub use procfs::ProcStatsSource;
pub use ps::PsStatsSource;

/// Platform capability for reading one sample of a process.
///
/// Implementations may block on OS queries; the sampler calls them from the
/// blocking thread pool.
pub trait StatsSource: Send + Sync {
    /// Reads the current memory and CPU usage of `pid`.
    fn get_stats(&self, pid: u32) -> Result<Sample, SourceError>;

    /// Short process name used to title charts.
    fn process_name(&self, pid: u32) -> Option<String>;

    /// Parent of `pid`, or `None` when it has none.
    fn parent_pid(&self, pid: u32) -> Result<Option<u32>, SourceError>;

    /// Whether `rss+swap` carries a real swap figure on this platform.
    fn supports_swap(&self) -> bool {
        true
    }
}

/// Returns the stats source for the current platform.
pub fn default_source() -> Arc<dyn StatsSource> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(ProcStatsSource::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(PsStatsSource::new())
    }
}

/// Checks that a process with this PID exists.
///
/// A permission error still means the process exists.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    true
}
