//! Memory parsing utilities for reading process memory figures from /proc.
//!
//! This module parses resident and swapped memory from
//! `/proc/<pid>/smaps_rollup` or, on older kernels, `/proc/<pid>/smaps`.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read buffer for smaps files. Full smaps of large processes can be several MB.
const SMAPS_BUFFER_BYTES: usize = 256 * 1024;

/// Resident and swapped memory of a single process, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryFigures {
    pub rss_kb: u64,
    pub swap_kb: u64,
}

impl MemoryFigures {
    pub fn rss_with_swap_kb(&self) -> u64 {
        self.rss_kb + self.swap_kb
    }
}

impl std::ops::AddAssign for MemoryFigures {
    fn add_assign(&mut self, other: Self) {
        self.rss_kb += other.rss_kb;
        self.swap_kb += other.swap_kb;
    }
}

/// Sums the `Rss:` and `Swap:` lines of an smaps-formatted file.
///
/// Works for both `smaps_rollup` (one block) and `smaps` (one block per mapping).
pub fn parse_smaps(path: &Path) -> Result<MemoryFigures, std::io::Error> {
    let file = fs::File::open(path)?;
    let reader = BufReader::with_capacity(SMAPS_BUFFER_BYTES, file);

    let mut figures = MemoryFigures::default();
    for line in reader.lines() {
        let l = line?;
        if let Some(kb) = l.strip_prefix("Rss:") {
            figures.rss_kb += parse_kb_value(kb).unwrap_or(0);
        } else if let Some(kb) = l.strip_prefix("Swap:") {
            figures.swap_kb += parse_kb_value(kb).unwrap_or(0);
        }
    }

    Ok(figures)
}

/// Parses kilobyte values from smaps file lines.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Reads memory figures for one process directory.
/// Uses smaps_rollup when available, otherwise falls back to full smaps.
pub fn read_memory_for_process(proc_path: &Path) -> Result<MemoryFigures, std::io::Error> {
    let rollup = proc_path.join("smaps_rollup");
    if rollup.exists() {
        return parse_smaps(&rollup);
    }

    parse_smaps(&proc_path.join("smaps"))
}
