//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::Local;
use peekprof::error::SourceError;
use peekprof::{Sample, StatsSource};
use std::sync::atomic::{AtomicU32, Ordering};

/// Stats source returning a fixed sequence of RSS values, then failing.
pub struct ScriptedSource {
    rss_kb: Vec<i64>,
    calls: AtomicU32,
    with_swap: bool,
}

impl ScriptedSource {
    /// Returns `rss_kb[i]` on call `i`; once the list is exhausted, every
    /// call fails with `ProcessGone`.
    pub fn new(rss_kb: Vec<i64>) -> Self {
        Self {
            rss_kb,
            calls: AtomicU32::new(0),
            with_swap: true,
        }
    }

    /// Never fails; RSS grows by 1024 kb per call.
    pub fn endless() -> Self {
        Self::new(Vec::new())
    }

    pub fn without_swap(mut self) -> Self {
        self.with_swap = false;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StatsSource for ScriptedSource {
    fn get_stats(&self, pid: u32) -> Result<Sample, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let rss = if self.rss_kb.is_empty() {
            (call as i64 + 1) * 1024
        } else {
            *self
                .rss_kb
                .get(call)
                .ok_or(SourceError::ProcessGone { pid })?
        };
        Ok(Sample::new(rss, rss + 10, 2.5, Local::now()))
    }

    fn process_name(&self, _pid: u32) -> Option<String> {
        Some("scripted".into())
    }

    fn parent_pid(&self, _pid: u32) -> Result<Option<u32>, SourceError> {
        Ok(None)
    }

    fn supports_swap(&self) -> bool {
        self.with_swap
    }
}
