//! peekprof - process memory and CPU profiler
//!
//! Samples one process, prints each sample and exports the run as CSV
//! and/or an HTML chart. This is the main entry point that resolves the
//! configuration, starts the target and hands the run to the coordinator.

mod cli;
mod commands;
mod config;

use anyhow::Context;
use clap::Parser;
use peekprof::child::spawn_command;
use peekprof::error::ConfigError;
use peekprof::process::{default_source, is_alive, StatsSource};
use peekprof::{LifecycleCoordinator, RunOptions, RunSummary, SinkSpec, Target};
use std::process::ExitCode;
use tracing::{debug, info, level_filters::LevelFilter};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config};
use config::{
    resolve_config, show_config, target_from_args, validate_effective_config, Config, TargetSpec,
};

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr so that stdout only carries samples and results.
fn setup_logging(level: LogLevel) {
    let max_level = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Resolves the PID to monitor when --parent is given.
fn resolve_parent(source: &dyn StatsSource, pid: u32) -> anyhow::Result<u32> {
    if !cfg!(target_os = "linux") {
        return Err(ConfigError::ParentUnsupported.into());
    }
    let parent = source
        .parent_pid(pid)
        .with_context(|| format!("failed getting parent pid of {}", pid))?;
    parent.ok_or_else(|| ConfigError::NoParent(pid).into())
}

/// Sinks in export order: CSV first, then the chart.
fn sink_specs(config: &Config, process_name: &str) -> Vec<SinkSpec> {
    let mut specs = Vec::new();
    if let Some(path) = &config.csv {
        specs.push(SinkSpec::Tabular { path: path.clone() });
    }
    if let Some(path) = &config.html {
        specs.push(SinkSpec::Chart {
            path: path.clone(),
            process_name: process_name.to_string(),
            live_host: config
                .live_enabled()
                .then(|| config.live_host().to_string()),
        });
    }
    specs
}

fn print_summary(summary: &RunSummary) {
    match &summary.export {
        Ok(written) => {
            for (kind, path) in written {
                println!("{} has been written at {}", kind, path.display());
            }
        }
        Err(e) => eprintln!("failed writing files: {}", e),
    }
    if let Some(e) = &summary.source_error {
        eprintln!("sampling stopped: {}", e);
    }
    println!("\npeak memory: {} mb", summary.peak.peak_mb());
    println!("{:?}", summary.elapsed);
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("Configuration invalid: {}", e);
                return Ok(ExitCode::FAILURE);
            }
            println!("Configuration is valid");
            return Ok(ExitCode::SUCCESS);
        }

        show_config(&config, &args.config_format)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = resolve_config(&args)?;
    validate_effective_config(&config).context("configuration invalid")?;
    setup_logging(config.log_level()?);

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Check { pid } => Ok(if command_check(*pid, &config) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }),
            Commands::Config {
                output,
                format,
                commented,
            } => {
                command_config(output.clone(), format.clone(), *commented)?;
                Ok(ExitCode::SUCCESS)
            }
        };
    }

    let output = config.output_mode()?;
    let source = default_source();

    let target = match target_from_args(&args)? {
        TargetSpec::Pid { pid, parent } => {
            if !is_alive(pid) {
                return Err(ConfigError::NoSuchProcess(pid).into());
            }
            let pid = if parent {
                let ppid = resolve_parent(source.as_ref(), pid)?;
                if let Some(banner) = output.banner("parent", ppid) {
                    println!("{banner}");
                }
                ppid
            } else {
                pid
            };
            Target::Pid(pid)
        }
        TargetSpec::Command(cmd) => {
            let child = spawn_command(&cmd, args.prc_output)?;
            if let Some(banner) = output.banner("running command", child.pid()) {
                println!("{banner}");
            }
            Target::Child(child)
        }
    };

    let pid = target.pid();
    let process_name = source
        .process_name(pid)
        .unwrap_or_else(|| pid.to_string());
    debug!(pid, name = %process_name, "Resolved target");

    let options = RunOptions {
        interval: config.refresh_interval()?,
        sinks: sink_specs(&config, &process_name),
        live_host: config
            .live_enabled()
            .then(|| config.live_host().to_string()),
        shutdown_timeout: config.shutdown_timeout(),
        broker_queue_depth: config.broker_queue_depth(),
        subscriber_buffer: config.subscriber_buffer(),
        output,
    };

    info!("Starting peekprof for pid {} ({})", pid, process_name);
    let summary = LifecycleCoordinator::new()
        .run(source, target, options)
        .await?;

    print_summary(&summary);
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Main application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
