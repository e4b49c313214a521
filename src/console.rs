//! Per-sample console echo.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::sample::Sample;

/// How samples are echoed on stdout while the run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Csv,
    Pretty,
    None,
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputMode::Csv),
            "pretty" => Ok(OutputMode::Pretty),
            "none" => Ok(OutputMode::None),
            _ => Err(ConfigError::InvalidOutput(s.to_string())),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Csv => write!(f, "csv"),
            OutputMode::Pretty => write!(f, "pretty"),
            OutputMode::None => write!(f, "none"),
        }
    }
}

impl OutputMode {
    /// Line printed once before the first sample.
    pub fn header(&self) -> Option<&'static str> {
        match self {
            OutputMode::Csv => Some("timestamp,rss kb,cpu%"),
            OutputMode::Pretty | OutputMode::None => None,
        }
    }

    /// Line printed when monitoring of `pid` starts, e.g. `running command pid: 42`.
    pub fn banner(&self, label: &str, pid: u32) -> Option<String> {
        match self {
            OutputMode::Pretty => Some(format!("{label} pid: {pid}")),
            OutputMode::Csv | OutputMode::None => None,
        }
    }

    pub fn line(&self, sample: &Sample) -> Option<String> {
        match self {
            OutputMode::Csv => Some(format!(
                "{},{},{:.1}",
                sample.captured_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                sample.rss_kb(),
                sample.cpu_percent()
            )),
            OutputMode::Pretty => Some(format!(
                "{}  memory usage: {} mb  cpu usage: {:.1}%",
                sample.captured_at.format("%H:%M:%S"),
                sample.rss_kb() / 1024,
                sample.cpu_percent()
            )),
            OutputMode::None => None,
        }
    }
}
