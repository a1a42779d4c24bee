//! Configuration management for VFMP.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, DEFAULT_PORT, DEFAULT_SNAPSHOT_NAME};
