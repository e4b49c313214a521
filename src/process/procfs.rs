//! Linux stats source backed by the /proc filesystem.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, trace};

use super::cpu::{parse_cpu_time_seconds, CpuTracker};
use super::memory::{read_memory_for_process, MemoryFigures};
use super::scanner::{is_exited, read_child_pids, read_parent_pid, read_process_name};
use super::StatsSource;
use crate::error::SourceError;
use crate::sample::Sample;

/// Reads memory and CPU usage of a process and its direct children from /proc.
pub struct ProcStatsSource {
    root: PathBuf,
    cpu: Mutex<CpuTracker>,
}

impl Default for ProcStatsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcStatsSource {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Uses a different proc root, e.g. a fixture directory in tests.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cpu: Mutex::new(CpuTracker::new()),
        }
    }

    fn proc_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_target(&self, pid: u32, path: &Path) -> Result<MemoryFigures, SourceError> {
        read_memory_for_process(path).map_err(|source| target_error(pid, path, source))
    }
}

/// Maps a failed read of the target's own files. The kernel answers ESRCH
/// for a zombie whose entry still exists.
fn target_error(pid: u32, path: &Path, source: std::io::Error) -> SourceError {
    if source.raw_os_error() == Some(libc::ESRCH) || !path.exists() || is_exited(path) {
        SourceError::ProcessGone { pid }
    } else {
        SourceError::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl StatsSource for ProcStatsSource {
    fn get_stats(&self, pid: u32) -> Result<Sample, SourceError> {
        let target = self.proc_path(pid);
        if !target.exists() || is_exited(&target) {
            return Err(SourceError::ProcessGone { pid });
        }

        let mut memory = self.read_target(pid, &target)?;
        let cpu_time =
            parse_cpu_time_seconds(&target).map_err(|source| target_error(pid, &target, source))?;

        let now = Instant::now();
        let mut tracker = self.cpu.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cpu_percent = tracker.record(pid, cpu_time, now);
        let mut seen = vec![pid];

        for child in read_child_pids(&target) {
            let child_path = self.proc_path(child);
            // Children can exit between listing and reading
            let figures = match read_memory_for_process(&child_path) {
                Ok(f) => f,
                Err(e) => {
                    trace!("Skipping child {} of {}: {}", child, pid, e);
                    continue;
                }
            };
            memory += figures;
            if let Ok(t) = parse_cpu_time_seconds(&child_path) {
                cpu_percent += tracker.record(child, t, now);
            }
            seen.push(child);
        }
        tracker.retain(&seen);
        drop(tracker);

        debug!(
            pid,
            children = seen.len() - 1,
            rss_kb = memory.rss_kb,
            swap_kb = memory.swap_kb,
            cpu_percent,
            "Read process stats"
        );

        Ok(Sample::new(
            memory.rss_kb as i64,
            memory.rss_with_swap_kb() as i64,
            cpu_percent as f32,
            Local::now(),
        ))
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        read_process_name(&self.proc_path(pid))
    }

    fn parent_pid(&self, pid: u32) -> Result<Option<u32>, SourceError> {
        let path = self.proc_path(pid);
        read_parent_pid(&path).map_err(|source| SourceError::Read {
            path: path.join("status"),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn write_proc(root: &Path, pid: u32, rss: u64, swap: u64, children: &str) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(dir.join("task").join(pid.to_string())).unwrap();
        fs::write(
            dir.join("smaps_rollup"),
            format!("Rss:  {rss} kB\nPss:  1 kB\nSwap:  {swap} kB\nSwapPss:  {swap} kB\n"),
        )
        .unwrap();
        fs::write(
            dir.join("stat"),
            format!("{pid} (app) S 1 1 1 0 -1 0 0 0 0 0 100 50 0 0 20 0 1 0 1 1 1"),
        )
        .unwrap();
        fs::write(dir.join("comm"), "app\n").unwrap();
        fs::write(dir.join("status"), "Name:\tapp\nPPid:\t77\n").unwrap();
        fs::write(dir.join("task").join(pid.to_string()).join("children"), children).unwrap();
    }

    fn fixture() -> TempDir {
        let root = tempdir().unwrap();
        write_proc(root.path(), 100, 1000, 10, "101 102");
        write_proc(root.path(), 101, 500, 5, "");
        // 102 is listed as a child but has already exited
        root
    }

    #[test]
    fn test_sums_target_and_children() {
        let root = fixture();
        let source = ProcStatsSource::with_root(root.path());

        let sample = source.get_stats(100).unwrap();
        assert_eq!(sample.rss_kb(), 1500);
        assert_eq!(sample.rss_swap_kb(), 1515);
        assert_eq!(sample.cpu_percent(), 0.0);
    }

    #[test]
    fn test_missing_process_is_gone() {
        let root = fixture();
        let source = ProcStatsSource::with_root(root.path());

        match source.get_stats(999) {
            Err(SourceError::ProcessGone { pid }) => assert_eq!(pid, 999),
            other => panic!("expected ProcessGone, got {:?}", other),
        }
    }

    #[test]
    fn test_zombie_is_gone() {
        let root = fixture();
        fs::write(
            root.path().join("100").join("stat"),
            "100 (app) Z 1 1 1 0 -1 0 0 0 0 0 100 50 0 0 20 0 1 0 1 1 1",
        )
        .unwrap();
        let source = ProcStatsSource::with_root(root.path());

        assert!(matches!(
            source.get_stats(100),
            Err(SourceError::ProcessGone { pid: 100 })
        ));
    }

    #[test]
    fn test_name_and_parent() {
        let root = fixture();
        let source = ProcStatsSource::with_root(root.path());

        assert_eq!(source.process_name(100).as_deref(), Some("app"));
        assert_eq!(source.parent_pid(100).unwrap(), Some(77));
        assert!(source.supports_swap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reads_own_process() {
        let source = ProcStatsSource::new();
        let sample = source.get_stats(std::process::id()).unwrap();
        assert!(sample.rss_kb() > 0);
        assert!(sample.rss_swap_kb() >= sample.rss_kb());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreaped_child_is_gone() {
        use std::time::{Duration, Instant};

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        let path = PathBuf::from("/proc").join(pid.to_string());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !is_exited(&path) {
            assert!(Instant::now() < deadline, "child never became a zombie");
            std::thread::sleep(Duration::from_millis(10));
        }

        let result = ProcStatsSource::new().get_stats(pid);
        child.wait().unwrap();

        match result {
            Err(SourceError::ProcessGone { pid: gone }) => assert_eq!(gone, pid),
            other => panic!("expected ProcessGone, got {:?}", other),
        }
    }
}
