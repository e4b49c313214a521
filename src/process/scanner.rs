//! Process discovery helpers for the /proc filesystem.
//!
//! Resolves names, parents and direct children of a PID.

use std::fs;
use std::path::Path;

/// Reads process name from comm file or extracts from cmdline.
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    if let Ok(s) = fs::read_to_string(proc_path.join("comm")) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }

    if let Ok(content) = fs::read(proc_path.join("cmdline")) {
        let first = content.split(|&b| b == 0u8).next().unwrap_or_default();
        if let Ok(arg0) = std::str::from_utf8(first) {
            if let Some(name) = Path::new(arg0).file_name() {
                return name.to_str().map(|s| s.to_string());
            }
        }
    }
    None
}

/// Reads the `PPid:` line of /proc/<pid>/status.
/// Returns `None` when the process has no parent (PPid 0).
pub fn read_parent_pid(proc_path: &Path) -> Result<Option<u32>, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("status"))?;

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("PPid:") {
            let ppid: u32 = v
                .trim()
                .parse()
                .map_err(|_| std::io::Error::other("Failed to parse PPid field"))?;
            return Ok((ppid > 0).then_some(ppid));
        }
    }

    Err(std::io::Error::other("PPid field missing from status"))
}

/// Reads the one-letter state field of /proc/<pid>/stat (`R`, `S`, `Z`, ...).
pub fn read_process_state(proc_path: &Path) -> Option<char> {
    let content = fs::read_to_string(proc_path.join("stat")).ok()?;
    let after_comm = &content[content.rfind(')')? + 1..];
    after_comm.split_whitespace().next()?.chars().next()
}

/// True for a process that has exited but is not reaped yet (`Z`) or is
/// being torn down (`X`).
pub fn is_exited(proc_path: &Path) -> bool {
    matches!(read_process_state(proc_path), Some('Z' | 'X'))
}

/// Lists direct children of a process by reading every
/// `/proc/<pid>/task/<tid>/children` file.
pub fn read_child_pids(proc_path: &Path) -> Vec<u32> {
    let mut out = Vec::new();
    let Ok(tasks) = fs::read_dir(proc_path.join("task")) else {
        return out;
    };

    for task in tasks.flatten() {
        let Ok(content) = fs::read_to_string(task.path().join("children")) else {
            continue;
        };
        out.extend(content.split_whitespace().filter_map(|p| p.parse::<u32>().ok()));
    }

    out.sort_unstable();
    out.dedup();
    out
}
