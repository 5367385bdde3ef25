//! Test fixtures and store helpers.
//!
//! Provides convenience functions for building snapshots and for setting
//! up the store pairs that sync tests run against.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use watchsync_protocol::{RawSnapshot, Timestamp};
use watchsync_storage::{ChangeScope, FileArea, InMemoryArea, RemoteLimits};

/// One day in milliseconds.
pub const DAY_MS: Timestamp = 24 * 60 * 60 * 1000;

/// Builds a raw snapshot from key/value pairs.
pub fn snapshot(pairs: &[(&str, Value)]) -> RawSnapshot {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A record value stamped with `timestamp`.
pub fn record(timestamp: Timestamp) -> Value {
    json!({ "timestamp": timestamp })
}

/// A record value with a title, stamped with `timestamp`.
pub fn titled(title: &str, timestamp: Timestamp) -> Value {
    json!({ "title": title, "timestamp": timestamp })
}

/// A tombstone value deleted at `deleted_at`.
pub fn tombstone(deleted_at: Timestamp) -> Value {
    json!({ "deletedAt": deleted_at })
}

/// A local in-memory area.
pub fn local_area() -> Arc<InMemoryArea> {
    Arc::new(InMemoryArea::new(ChangeScope::Local))
}

/// A shared in-memory area enforcing the default remote limits.
///
/// Hand the same area to several schedulers to model devices sharing one
/// remote store.
pub fn shared_remote() -> Arc<InMemoryArea> {
    let limits = RemoteLimits::default().area_limits();
    Arc::new(InMemoryArea::with_limits(ChangeScope::Sync, limits))
}

/// A pair of file-backed areas in a temporary directory.
pub struct TempStores {
    /// Local store document.
    pub local: Arc<FileArea>,
    /// Remote store document.
    pub remote: Arc<FileArea>,
    dir: TempDir,
}

impl TempStores {
    /// Creates empty local and remote documents.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let local = FileArea::open(&dir.path().join("local.json"), ChangeScope::Local)
            .expect("Failed to open local area");
        let remote = FileArea::open(&dir.path().join("remote.json"), ChangeScope::Sync)
            .expect("Failed to open remote area");
        Self {
            local: Arc::new(local),
            remote: Arc::new(remote),
            dir,
        }
    }

    /// Directory holding both documents.
    pub fn dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Reopens the local document, as a restarted process would.
    pub fn reopen_local(&self) -> Arc<FileArea> {
        let area = FileArea::open(&self.dir.path().join("local.json"), ChangeScope::Local)
            .expect("Failed to reopen local area");
        Arc::new(area)
    }
}

impl Default for TempStores {
    fn default() -> Self {
        Self::new()
    }
}
