//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// Default port of the daemon's protocol listener.
pub const DEFAULT_PORT: u16 = 32768;

/// Default snapshot file name inside the data directory.
pub const DEFAULT_SNAPSHOT_NAME: &str = "trie.gob";

/// Main configuration for the VFMP daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the snapshot.
    pub data_dir: PathBuf,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Snapshot file name, relative to `data_dir`.
    pub snapshot_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/vfmp"),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            snapshot_name: DEFAULT_SNAPSHOT_NAME.to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.snapshot_name.is_empty() {
            return Err(Error::config("snapshot name cannot be empty"));
        }

        Ok(())
    }

    /// Create the data directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            tracing::info!(dir = %self.data_dir.display(), "Creating data directory");
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }

    /// Get the path to the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_name)
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
