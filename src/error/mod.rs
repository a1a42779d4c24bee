//! Error types and Result aliases for VFMP.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using VFMP's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for VFMP operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Path trie error.
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),

    /// Snapshot persistence error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Filesystem walk error.
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    /// Wire protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Path trie errors.
#[derive(Error, Debug)]
pub enum TrieError {
    /// Path was never indexed, or was already removed.
    #[error("path not found: '{path}'")]
    NotFound { path: String },
}

/// Snapshot load/save errors.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// No snapshot file at the given location.
    #[error("no snapshot at {}", path.display())]
    NotFound { path: PathBuf },

    /// Snapshot could not be decompressed or decoded.
    #[error("corrupt snapshot {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Filesystem failure while reading or writing a snapshot.
    #[error("snapshot I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// First traversal failure of a walk.
#[derive(Error, Debug, Clone)]
#[error("failed to walk '{path}': {reason}")]
pub struct WalkError {
    pub path: String,
    pub reason: String,
}

/// Wire protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not a valid envelope.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Envelope payload does not match its message type.
    #[error("invalid {kind} payload: {reason}")]
    Payload { kind: String, reason: String },

    /// Response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(String),
}

/// Server errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Request handling error.
    #[error("request error: {0}")]
    Request(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl TrieError {
    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

impl SnapshotError {
    /// Create a corrupt-snapshot error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Map an I/O failure on `path`, turning a missing file into `NotFound`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

impl ProtocolError {
    /// Create a payload error for the given message type.
    pub fn payload(kind: impl Into<String>, reason: impl ToString) -> Self {
        Self::Payload {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}
