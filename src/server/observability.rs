//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Session and request spans for the protocol server

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Initialize tracing with the given level and output format.
///
/// # Panics
///
/// Panics if a global tracing subscriber has already been installed in this
/// process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Get current tracing configuration from environment variables.
///
/// Respects these environment variables:
/// - `VFMP_LOG_LEVEL` - Log level (default: "info")
/// - `VFMP_LOG_JSON` - Enable JSON output (default: false)
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let level = std::env::var("VFMP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("VFMP_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    TracingConfig { level, json }
}

/// Span constructors for the protocol server.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span covering one accepted connection.
    #[must_use]
    pub fn session_span(session_id: &str, peer: &str) -> Span {
        info_span!("session", id = %session_id, peer = %peer)
    }

    /// Span covering one dispatched request.
    #[must_use]
    pub fn request_span(kind: &str) -> Span {
        info_span!("request", kind = %kind)
    }
}
