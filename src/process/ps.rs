//! Portable Unix stats source built on `ps`.
//!
//! Used where /proc is not available (macOS, BSDs). `ps` reports no swap
//! figure, so `rss+swap` equals `rss` and sinks drop that column.

use chrono::Local;
use std::process::Command;

use super::StatsSource;
use crate::error::SourceError;
use crate::sample::Sample;

#[derive(Debug, Default, Clone, Copy)]
pub struct PsStatsSource;

impl PsStatsSource {
    pub fn new() -> Self {
        Self
    }
}

/// Runs `ps -p <pid> -o <fields>` with headers suppressed.
/// Returns `None` when `ps` printed nothing, i.e. the process does not exist.
fn ps_query(pid: u32, fields: &str) -> Result<Option<String>, SourceError> {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", fields])
        .output()
        .map_err(|e| SourceError::Command {
            command: format!("ps -p {pid} -o {fields}"),
            detail: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

/// Parses one `rss= %cpu=` line of `ps` output.
pub fn parse_rss_cpu_line(pid: u32, line: &str) -> Result<(i64, f32), SourceError> {
    let mut parts = line.split_whitespace();
    let rss = parts
        .next()
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| SourceError::Parse {
            pid,
            what: "rss",
            detail: line.to_string(),
        })?;
    let cpu = parts
        .next()
        .and_then(|v| v.replace(',', ".").parse::<f32>().ok())
        .ok_or_else(|| SourceError::Parse {
            pid,
            what: "%cpu",
            detail: line.to_string(),
        })?;
    Ok((rss, cpu))
}

impl StatsSource for PsStatsSource {
    fn get_stats(&self, pid: u32) -> Result<Sample, SourceError> {
        let line = ps_query(pid, "rss=,%cpu=")?.ok_or(SourceError::ProcessGone { pid })?;
        let (rss, cpu) = parse_rss_cpu_line(pid, &line)?;
        Ok(Sample::new(rss, rss, cpu, Local::now()))
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        let comm = ps_query(pid, "comm=").ok()??;
        std::path::Path::new(&comm)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
    }

    fn parent_pid(&self, pid: u32) -> Result<Option<u32>, SourceError> {
        let Some(line) = ps_query(pid, "ppid=")? else {
            return Err(SourceError::ProcessGone { pid });
        };
        let ppid: u32 = line.parse().map_err(|_| SourceError::Parse {
            pid,
            what: "ppid",
            detail: line.clone(),
        })?;
        Ok((ppid > 0).then_some(ppid))
    }

    fn supports_swap(&self) -> bool {
        false
    }
}
