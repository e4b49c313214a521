//! Spawning the monitored command.

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ChildError;

const RESET: &str = "\x1b[0m";

/// Which stream of the child a forwarded line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

/// Formats one forwarded line with its colored stream tag.
pub fn tag_line(stream: ChildStream, line: &str) -> String {
    match stream {
        ChildStream::Stdout => format!("\x1b[1;34m[stdout]{RESET}\t\x1b[34m{line}{RESET}"),
        ChildStream::Stderr => format!("\x1b[1;31m[err]{RESET}\t\x1b[31m{line}{RESET}"),
    }
}

/// A command started by the profiler.
pub struct MonitoredChild {
    child: Child,
    pid: u32,
    forwarders: Vec<JoinHandle<()>>,
}

impl MonitoredChild {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Waits for the command to exit and for its forwarded output to drain.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        for forwarder in self.forwarders.drain(..) {
            let _ = forwarder.await;
        }
        Ok(status)
    }
}

/// Starts `cmdline`, split on whitespace and run without a shell.
///
/// With `forward_output` the child's stdout and stderr are echoed line by
/// line with colored tags; otherwise they are discarded.
pub fn spawn_command(cmdline: &str, forward_output: bool) -> Result<MonitoredChild, ChildError> {
    let mut args = cmdline.split_whitespace();
    let program = args.next().ok_or(ChildError::EmptyCommand)?;

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    if forward_output {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let mut child = command.spawn().map_err(|source| ChildError::Spawn {
        command: cmdline.to_string(),
        source,
    })?;
    let pid = child.id().ok_or(ChildError::NoPid)?;
    debug!(pid, "Started command `{}`", cmdline);

    let mut forwarders = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        forwarders.push(tokio::spawn(forward_lines(
            BufReader::new(stdout),
            ChildStream::Stdout,
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        forwarders.push(tokio::spawn(forward_lines(
            BufReader::new(stderr),
            ChildStream::Stderr,
        )));
    }

    Ok(MonitoredChild {
        child,
        pid,
        forwarders,
    })
}

async fn forward_lines<R>(reader: R, stream: ChildStream)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                ChildStream::Stdout => println!("{}", tag_line(stream, &line)),
                ChildStream::Stderr => eprintln!("{}", tag_line(stream, &line)),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read child {:?}: {}", stream, e);
                break;
            }
        }
    }
}
