//! Compressed on-disk snapshots of a [`PathTrie`].
//!
//! Layout: a 4-byte magic header followed by a zstd frame (with content
//! checksum) holding the bincode encoding of the trie. The format is internal
//! and carries no version; anything that does not decode fails as
//! [`SnapshotError::Corrupt`]. Decoding is bounded by [`MAX_SNAPSHOT_BYTES`],
//! so a forged length prefix is rejected instead of allocated.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bincode::Options;

use crate::error::SnapshotError;
use crate::trie::PathTrie;
use crate::Result;

/// Header identifying a snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"VFTR";

/// zstd compression level used for snapshots.
const COMPRESSION_LEVEL: i32 = 3;

/// Upper bound on the decompressed, encoded size of a snapshot.
pub const MAX_SNAPSHOT_BYTES: u64 = 1024 * 1024 * 1024;

fn encoding() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_SNAPSHOT_BYTES)
}

fn io_error(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `trie` to `path`, fully replacing any previous snapshot.
///
/// The snapshot is written to a uniquely named sibling file and renamed into
/// place, so readers never observe a half-written file. Concurrent writers
/// race; the last rename wins.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] on any filesystem or encoding failure.
pub fn save(trie: &PathTrie, path: &Path) -> std::result::Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    if let Err(e) = write_snapshot(trie, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_error(path, e)
    })?;

    tracing::debug!(path = %path.display(), entries = trie.len(), "Snapshot saved");
    Ok(())
}

fn write_snapshot(trie: &PathTrie, tmp_path: &Path) -> std::result::Result<(), SnapshotError> {
    let file = File::create(tmp_path).map_err(|e| io_error(tmp_path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&SNAPSHOT_MAGIC)
        .map_err(|e| io_error(tmp_path, e))?;

    let mut encoder =
        zstd::Encoder::new(writer, COMPRESSION_LEVEL).map_err(|e| io_error(tmp_path, e))?;
    encoder
        .include_checksum(true)
        .map_err(|e| io_error(tmp_path, e))?;

    encoding()
        .serialize_into(&mut encoder, trie)
        .map_err(|e| io_error(tmp_path, std::io::Error::other(e.to_string())))?;

    let writer = encoder.finish().map_err(|e| io_error(tmp_path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| io_error(tmp_path, e.into_error()))?;
    file.sync_all().map_err(|e| io_error(tmp_path, e))
}

/// Read a snapshot written by [`save`].
///
/// # Errors
///
/// Returns [`SnapshotError::NotFound`] if the file is absent and
/// [`SnapshotError::Corrupt`] if it cannot be decompressed or decoded.
pub fn load(path: &Path) -> std::result::Result<PathTrie, SnapshotError> {
    let file = File::open(path).map_err(|e| SnapshotError::from_io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| SnapshotError::corrupt(path, format!("missing header: {e}")))?;
    if magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::corrupt(path, "unrecognized header"));
    }

    let decoder =
        zstd::Decoder::with_buffer(reader).map_err(|e| SnapshotError::corrupt(path, e))?;
    let trie: PathTrie = encoding()
        .deserialize_from(decoder)
        .map_err(|e| SnapshotError::corrupt(path, e))?;

    tracing::debug!(path = %path.display(), entries = trie.len(), "Snapshot loaded");
    Ok(trie)
}

/// Async version of [`save`], run on the blocking pool.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be written.
pub async fn save_async(trie: PathTrie, path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || save(&trie, &path))
        .await
        .map_err(|e| crate::Error::internal(format!("Snapshot save task failed: {e}")))?
        .map_err(Into::into)
}

/// Async version of [`load`], run on the blocking pool.
///
/// # Errors
///
/// Returns an error if the snapshot is missing or corrupt.
pub async fn load_async(path: PathBuf) -> Result<PathTrie> {
    tokio::task::spawn_blocking(move || load(&path))
        .await
        .map_err(|e| crate::Error::internal(format!("Snapshot load task failed: {e}")))?
        .map_err(Into::into)
}
