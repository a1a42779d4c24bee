//! Main application server.
//!
//! Owns the TCP listener, spawns one session task per accepted connection,
//! and coordinates shutdown through a [`CancellationToken`] that is fired by
//! a `kill` request or by Ctrl+C/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::observability::spans;
use super::session::{new_session_id, run_session, SessionContext};
use crate::config::{Config, DEFAULT_PORT, DEFAULT_SNAPSHOT_NAME};
use crate::error::ServerError;
use crate::walker::DEFAULT_SAMPLE_INTERVAL;
use crate::Result;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Snapshot file read by search and written by index
    pub snapshot_path: PathBuf,
    /// Interval between walk progress frames
    pub sample_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            snapshot_path: PathBuf::from("/var/lib/vfmp").join(DEFAULT_SNAPSHOT_NAME),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            snapshot_path: config.snapshot_path(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Application server.
#[derive(Debug)]
pub struct App {
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the server when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if the listener cannot be bound.
    pub async fn run(self) -> Result<()> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until a `kill`
    /// request, a shutdown signal, or cancellation of [`Self::shutdown_token`].
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, snapshot = %self.config.snapshot_path.display(), "Server listening");

        let ctx = Arc::new(SessionContext {
            snapshot_path: self.config.snapshot_path.clone(),
            sample_interval: self.config.sample_interval,
            shutdown: self.shutdown.clone(),
        });

        let signal = shutdown_signal();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                () = &mut signal => {
                    self.shutdown.cancel();
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let span = spans::session_span(&new_session_id(), &peer.to_string());
                        tokio::spawn(run_session(stream, Arc::clone(&ctx)).instrument(span));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Error accepting connection");
                    }
                },
            }
        }

        tracing::info!("Server shut down");
        Ok(())
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Start a daemon storing its snapshot under `data_dir` and listening on
/// `port` on the loopback interface. Returns once the daemon has been killed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the data directory
/// cannot be created, or the port cannot be bound.
pub async fn start_server(data_dir: impl Into<PathBuf>, port: u16) -> Result<()> {
    let config = Config {
        data_dir: data_dir.into(),
        port,
        ..Config::default()
    };
    config.validate()?;
    config.ensure_data_dir()?;

    App::new(ServerConfig::from(&config)).run().await
}
