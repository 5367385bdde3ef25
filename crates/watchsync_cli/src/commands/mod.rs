//! CLI command implementations.

pub mod chunk;
pub mod inspect;
pub mod merge;
pub mod sync;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use watchsync_protocol::RawSnapshot;
use watchsync_storage::StorageError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The document does not exist.
    #[error("no store document at {0:?}")]
    Missing(PathBuf),

    /// The document is not a JSON object.
    #[error("{path:?} is not a store document: {source}")]
    Invalid {
        /// Document path.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A store document could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The remote store failed its probe.
    #[error("remote store at {0:?} is not available")]
    NotAvailable(PathBuf),

    /// A sync cycle failed.
    #[error("sync failed: {0}")]
    SyncFailed(String),
}

/// Result type for CLI commands.
pub type CommandResult<T> = Result<T, CommandError>;

/// Reads a store document. An empty file is an empty store.
pub fn read_document(path: &Path) -> CommandResult<RawSnapshot> {
    if !path.exists() {
        return Err(CommandError::Missing(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(RawSnapshot::new());
    }
    serde_json::from_str(&text).map_err(|source| CommandError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a store document in the same layout the file area uses.
pub fn write_document(path: &Path, document: &RawSnapshot) -> CommandResult<()> {
    let bytes = serde_json::to_vec_pretty(document).map_err(io::Error::other)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Formats a byte count for display.
pub fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
