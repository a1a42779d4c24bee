//! Protocol server.
//!
//! This module provides:
//! - The TCP accept loop and shutdown coordination
//! - Per-connection sessions speaking the line-delimited JSON protocol
//! - Handlers for ping, count, index, search and kill
//! - Tracing setup

mod app;
mod handlers;
mod observability;
mod session;

pub use app::{start_server, App, ServerConfig};
pub use handlers::execute_search;
pub use observability::{config_from_env, init_tracing, spans, TracingConfig};
pub use session::{new_session_id, run_session, SessionContext};
