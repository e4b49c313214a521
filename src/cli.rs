//! CLI arguments and subcommands for peekprof.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "peekprof",
    about = "Profile the memory and CPU usage of a process",
    long_about = "Profile the memory and CPU usage of a process.\n\n\
                  Tracks a running process (--pid) or a command it starts itself (--cmd), \
                  prints one line per sample and exports the run as CSV and/or an HTML chart. \
                  With --html, the chart can follow the run live in a browser.",
    version,
    propagate_version = true,
    after_help = "Output:\n  \
                  csv (default):  timestamp,rss kb,cpu% heading, then one row per sample\n  \
                  --pretty:       HH:MM:SS  memory usage: N mb  cpu usage: X%\n  \
                  Both end with the peak memory and the profiling time."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Track a running process by its PID
    #[arg(long, conflicts_with = "cmd")]
    pub pid: Option<u32>,

    /// Run a command and track it (split on whitespace, no shell)
    #[arg(long)]
    pub cmd: Option<String>,

    /// Extract a chart into an HTML file
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Extract timestamped memory data into a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Sampling interval, e.g. 100ms, 1s, 1m30s (units: ns, us, ms, s, m, h)
    #[arg(long, value_parser = parse_refresh)]
    pub refresh: Option<Duration>,

    /// Print the command's stdout and stderr
    #[arg(long)]
    pub prc_output: bool,

    /// Track the parent of --pid (Linux only)
    #[arg(long, requires = "pid")]
    pub parent: bool,

    /// Do not print samples to the console
    #[arg(long, alias = "nooutput", conflicts_with = "pretty")]
    pub no_output: bool,

    /// Human-friendly output instead of CSV lines
    #[arg(long)]
    pub pretty: bool,

    /// Serve live updates to the HTML chart while profiling (default: true)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub live: Option<bool>,

    /// host:port of the live-update server
    #[arg(long, alias = "livehost")]
    pub live_host: Option<String>,

    /// Seconds to wait for the live server to stop
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,

    /// Log level (written to stderr)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that process stats can be read on this system
    Check {
        /// PID to read (defaults to the profiler itself)
        #[arg(long)]
        pid: Option<u32>,
    },

    /// Generate a configuration file with the default values
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments
        #[arg(long)]
        commented: bool,
    },
}

/// Parses a duration such as `100ms`, `2s` or `1m30s`.
///
/// A bare `0` is accepted so that it can be rejected with a clearer error
/// by configuration validation.
pub fn parse_refresh(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".into());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || format!("invalid duration '{s}'");
    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..num_end].parse().map_err(|_| invalid())?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration '{s}'")),
            unit => return Err(format!("unknown unit '{unit}' in duration '{s}'")),
        };
        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
        rest = &rest[unit_end..];
    }

    Ok(total)
}
