//! Config command implementation.
//!
//! Generates configuration files in various formats.

use anyhow::Context;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates a configuration file holding the default values.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| PathBuf::from("peekprof.yaml"));

    let mut content = render_config(&Config::default(), &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# peekprof configuration
# =======================
#
# Sampling
# --------
# refresh: "100ms"             # Sampling interval (ns, us, ms, s, m, h)
# output: "csv"                # Console echo: csv, pretty or none
#
# Export
# ------
# csv: null                    # CSV file written at the end of the run
# html: null                   # HTML chart written at the end of the run
#
# Live Updates (with html)
# ------------------------
# live: true                   # Stream samples to the open chart
# live_host: "localhost:8089"  # host:port of the live-update server
# shutdown_timeout_secs: 15    # Wait for the live server to stop
# broker_queue_depth: 64       # Pending samples before live updates are dropped
# subscriber_buffer: 16        # Pending samples per viewer
#
# Logging
# -------
# log_level: "warn"            # off, error, warn, info, debug, trace (stderr)
"#;

    format!("{comments}\n{yaml}")
}
