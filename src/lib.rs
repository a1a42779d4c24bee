//! VFMP library
//!
//! Filesystem path index daemon. Walks a directory tree, stores every file
//! path in a segment trie persisted to disk, and answers exact filename and
//! fuzzy path queries over a line-delimited JSON protocol on a local TCP port.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod trie;
pub mod walker;

pub use config::Config;
pub use error::{Error, Result};
