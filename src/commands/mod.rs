//! CLI command implementations for peekprof.
//!
//! - `check`: reads one sample and validates the configuration
//! - `config`: configuration file generation

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
