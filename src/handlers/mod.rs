//! HTTP endpoint handlers for the live transport.
//!
//! - `/process/updates`: server-sent events, one event per sample
//! - `/health`: plain-text status with the number of connected viewers

pub mod health;
pub mod updates;

pub use health::health_handler;
pub use updates::updates_handler;
