//! CPU statistics parsing for process metrics.
//!
//! This module parses CPU time from `/proc/<pid>/stat` and turns consecutive
//! readings into a usage percentage.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Last CPU time reading of one process.
#[derive(Clone, Copy, Debug)]
pub struct CpuEntry {
    pub cpu_time_seconds: f64,
    pub last_updated: Instant,
}

/// Parse total CPU time (user+system) in seconds from /proc/<pid>/stat.
///
/// The command name field may contain spaces and parentheses, so fields are
/// counted from the last `)`.
pub fn parse_cpu_time_seconds(proc_path: &Path) -> Result<f64, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("stat"))?;
    parse_cpu_time_from_stat(&content)
        .ok_or_else(|| std::io::Error::other("Invalid stat format"))
}

fn parse_cpu_time_from_stat(content: &str) -> Option<f64> {
    let after_comm = &content[content.rfind(')')? + 1..];
    let parts: Vec<&str> = after_comm.split_whitespace().collect();
    // state is field 3 overall, index 0 here; utime/stime are fields 14/15
    if parts.len() <= 12 {
        return None;
    }

    let utime: f64 = parts[11].parse().ok()?;
    let stime: f64 = parts[12].parse().ok()?;

    Some((utime + stime) / *CLK_TCK)
}

/// Per-PID CPU time cache turning successive readings into percentages.
#[derive(Default)]
pub struct CpuTracker {
    entries: HashMap<u32, CpuEntry>,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reading and returns the usage since the previous one.
    /// The first reading of a PID yields 0.
    pub fn record(&mut self, pid: u32, cpu_time_seconds: f64, now: Instant) -> f64 {
        let mut cpu_percent = 0.0;

        if let Some(entry) = self.entries.get(&pid) {
            let dt = now.duration_since(entry.last_updated).as_secs_f64();
            if dt > 0.0 {
                let delta_cpu = cpu_time_seconds - entry.cpu_time_seconds;
                if delta_cpu > 0.0 {
                    cpu_percent = (delta_cpu / dt) * 100.0;
                }
            }
        }

        self.entries.insert(
            pid,
            CpuEntry {
                cpu_time_seconds,
                last_updated: now,
            },
        );

        cpu_percent
    }

    /// Drops cached readings of PIDs that were not seen in the latest tick.
    pub fn retain(&mut self, live: &[u32]) {
        self.entries.retain(|pid, _| live.contains(pid));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
