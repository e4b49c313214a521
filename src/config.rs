//! Configuration management for peekprof.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use peekprof::console::OutputMode;
use peekprof::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{parse_refresh, Args, ConfigFormat, LogLevel};

// Default configuration constants
pub const DEFAULT_REFRESH: &str = "100ms";
pub const DEFAULT_LIVE_HOST: &str = "localhost:8089";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_BROKER_QUEUE_DEPTH: usize = 64;
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Effective configuration. Every field is optional so partial files merge
/// over the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Sampling
    pub refresh: Option<String>,
    /// "csv" | "pretty" | "none"
    pub output: Option<String>,

    // Export
    pub csv: Option<PathBuf>,
    pub html: Option<PathBuf>,

    // Live updates
    pub live: Option<bool>,
    #[serde(alias = "livehost")]
    pub live_host: Option<String>,
    pub shutdown_timeout_secs: Option<u64>,
    pub broker_queue_depth: Option<usize>,
    pub subscriber_buffer: Option<usize>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh: Some(DEFAULT_REFRESH.into()),
            output: Some(OutputMode::Csv.to_string()),
            csv: None,
            html: None,
            live: Some(true),
            live_host: Some(DEFAULT_LIVE_HOST.into()),
            shutdown_timeout_secs: Some(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            broker_queue_depth: Some(DEFAULT_BROKER_QUEUE_DEPTH),
            subscriber_buffer: Some(DEFAULT_SUBSCRIBER_BUFFER),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        let raw = self.refresh.as_deref().unwrap_or(DEFAULT_REFRESH);
        let interval = parse_refresh(raw).map_err(ConfigError::InvalidRefresh)?;
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(interval)
    }

    pub fn output_mode(&self) -> Result<OutputMode, ConfigError> {
        self.output.as_deref().unwrap_or("csv").parse()
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        let raw = self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
        <LogLevel as clap::ValueEnum>::from_str(raw, true)
            .map_err(|_| ConfigError::InvalidLogLevel(raw.to_string()))
    }

    pub fn live_host(&self) -> &str {
        self.live_host.as_deref().unwrap_or(DEFAULT_LIVE_HOST)
    }

    /// Live updates need a chart to show them.
    pub fn live_enabled(&self) -> bool {
        self.live.unwrap_or(true) && self.html.is_some()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_timeout_secs
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        )
    }

    pub fn broker_queue_depth(&self) -> usize {
        self.broker_queue_depth.unwrap_or(DEFAULT_BROKER_QUEUE_DEPTH)
    }

    pub fn subscriber_buffer(&self) -> usize {
        self.subscriber_buffer.unwrap_or(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Checks that `host` looks like `host:port`.
pub fn validate_live_host(host: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidLiveHost(host.to_string());
    let (name, port) = host.rsplit_once(':').ok_or_else(invalid)?;
    if name.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    cfg.refresh_interval()?;
    cfg.output_mode()?;
    cfg.log_level()?;
    validate_live_host(cfg.live_host())?;

    if cfg.broker_queue_depth() == 0 {
        return Err(ConfigError::ZeroCapacity {
            field: "broker_queue_depth",
        });
    }
    if cfg.subscriber_buffer() == 0 {
        return Err(ConfigError::ZeroCapacity {
            field: "subscriber_buffer",
        });
    }

    Ok(())
}

/// The process to monitor, as requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    Pid { pid: u32, parent: bool },
    Command(String),
}

/// Exactly one of --pid (positive) and --cmd (non-empty) is required.
pub fn target_from_args(args: &Args) -> Result<TargetSpec, ConfigError> {
    let pid = args.pid.filter(|pid| *pid > 0);
    let cmd = args
        .cmd
        .as_deref()
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty());

    match (pid, cmd) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingTarget),
        (Some(pid), None) => Ok(TargetSpec::Pid {
            pid,
            parent: args.parent,
        }),
        (None, Some(cmd)) => Ok(TargetSpec::Command(cmd.to_string())),
        (None, None) => Err(ConfigError::MissingTarget),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(refresh) = args.refresh {
        config.refresh = Some(format!("{}ns", refresh.as_nanos()));
    }
    if args.no_output {
        config.output = Some(OutputMode::None.to_string());
    } else if args.pretty {
        config.output = Some(OutputMode::Pretty.to_string());
    }

    if let Some(csv) = &args.csv {
        config.csv = Some(csv.clone());
    }
    if let Some(html) = &args.html {
        config.html = Some(html.clone());
    }

    if let Some(live) = args.live {
        config.live = Some(live);
    }
    if let Some(host) = &args.live_host {
        config.live_host = Some(host.clone());
    }
    if let Some(secs) = args.shutdown_timeout {
        config.shutdown_timeout_secs = Some(secs);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(
            clap::ValueEnum::to_possible_value(&level)
                .map(|v| v.get_name().to_string())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
        );
    }

    Ok(config)
}

/// Loads a config file, or the first default location that exists.
///
/// Missing keys fall back to [`Config::default`]. An explicitly given path
/// that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::File {
                    path: p.to_path_buf(),
                    detail: "file not found".into(),
                });
            }
            p.to_path_buf()
        }
        None => {
            let defaults = ["./peekprof.yaml", "./peekprof.yml", "./peekprof.json"];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    let file_err = |detail: String| ConfigError::File {
        path: path.clone(),
        detail,
    };
    let content = fs::read_to_string(&path).map_err(|e| file_err(e.to_string()))?;

    let loaded: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| file_err(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| file_err(e.to_string()))?,
        // Default to YAML
        _ => serde_yaml::from_str(&content).map_err(|e| file_err(e.to_string()))?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(merge_over_defaults(loaded))
}

fn merge_over_defaults(loaded: Config) -> Config {
    let defaults = Config::default();
    Config {
        refresh: loaded.refresh.or(defaults.refresh),
        output: loaded.output.or(defaults.output),
        csv: loaded.csv,
        html: loaded.html,
        live: loaded.live.or(defaults.live),
        live_host: loaded.live_host.or(defaults.live_host),
        shutdown_timeout_secs: loaded
            .shutdown_timeout_secs
            .or(defaults.shutdown_timeout_secs),
        broker_queue_depth: loaded.broker_queue_depth.or(defaults.broker_queue_depth),
        subscriber_buffer: loaded.subscriber_buffer.or(defaults.subscriber_buffer),
        log_level: loaded.log_level.or(defaults.log_level),
    }
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<String> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
