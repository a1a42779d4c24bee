//! Directory walker for counting and indexing.
//!
//! Walks a tree with `walkdir`, counting every non-directory entry and, in
//! index mode, inserting its full path into a fresh [`PathTrie`].
//!
//! Progress is sampled on a timer rather than per file. Samples go out with
//! `try_send`, so a slow consumer only loses intermediate counts; the final
//! count is always delivered before the channel closes.
//!
//! The first traversal error aborts the walk. The outcome still carries the
//! count reached so far and the final count is still sent.
//!
//! Paths that are not valid UTF-8 are indexed lossily, with invalid bytes
//! replaced by U+FFFD, and logged at debug level.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::error::WalkError;
use crate::trie::PathTrie;

/// Default interval between progress samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// What a walk produces besides its count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Only count files.
    Count,
    /// Count files and build a [`PathTrie`] of their paths.
    Index,
}

/// Result of a finished walk.
#[derive(Debug)]
pub struct WalkOutcome {
    /// Files seen before the walk finished or aborted.
    pub count: u64,
    /// Index built in [`WalkMode::Index`].
    pub trie: Option<PathTrie>,
    /// First traversal error, if the walk aborted.
    pub error: Option<WalkError>,
}

impl WalkOutcome {
    /// Whether the walk visited the whole tree.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// A single walk over one root directory.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    mode: WalkMode,
    sample_interval: Duration,
}

impl Walker {
    /// Create a walker over `root`.
    pub fn new(root: impl Into<PathBuf>, mode: WalkMode) -> Self {
        Self {
            root: root.into(),
            mode,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    /// Override the progress sampling interval.
    #[must_use]
    pub const fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Run the walk on the current thread.
    ///
    /// Must not be called from inside an async context: the final count is
    /// delivered with a blocking send.
    pub fn run(self, progress: &mpsc::Sender<u64>) -> WalkOutcome {
        let started = Instant::now();
        tracing::info!(root = %self.root.display(), mode = ?self.mode, "Starting walk");

        let mut trie = (self.mode == WalkMode::Index).then(PathTrie::new);
        let mut count: u64 = 0;
        let mut error = None;
        let mut last_sample = Instant::now();

        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .unwrap_or(&self.root)
                        .to_string_lossy()
                        .into_owned();
                    tracing::warn!(path = %path, error = %e, "Walk aborted");
                    error = Some(WalkError {
                        path,
                        reason: e.to_string(),
                    });
                    break;
                }
            };

            if !entry.file_type().is_dir() {
                count += 1;
                if let Some(trie) = trie.as_mut() {
                    let path = entry.path().to_string_lossy();
                    if entry.path().to_str().is_none() {
                        tracing::debug!(path = %path, "Indexing non-UTF-8 path lossily");
                    }
                    trie.insert(&path);
                }
            }

            if last_sample.elapsed() >= self.sample_interval {
                last_sample = Instant::now();
                // Dropped when the consumer still holds the previous sample
                let _ = progress.try_send(count);
            }
        }

        if progress.blocking_send(count).is_err() {
            tracing::debug!("Progress receiver dropped before final count");
        }

        tracing::info!(
            root = %self.root.display(),
            count,
            complete = error.is_none(),
            elapsed = ?started.elapsed(),
            "Walk finished"
        );

        WalkOutcome { count, trie, error }
    }

    /// Run the walk on the blocking pool.
    ///
    /// Returns the progress receiver and a handle to the outcome. The
    /// receiver yields `None` once the final count has been received.
    #[must_use]
    pub fn spawn(self) -> (mpsc::Receiver<u64>, JoinHandle<WalkOutcome>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::task::spawn_blocking(move || self.run(&tx));
        (rx, handle)
    }
}
