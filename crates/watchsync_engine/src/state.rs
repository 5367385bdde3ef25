//! Sync status, persisted settings and cycle reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;
use watchsync_protocol::{MergeReport, Timestamp};
use watchsync_storage::StorageError;

use crate::error::SyncResult;

/// Local key under which [`SyncSettings`] are persisted.
pub const SETTINGS_KEY: &str = "sync_settings";

/// The current status of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Sync is switched off.
    Disabled,
    /// Probing the remote store and running the first sync.
    Initializing,
    /// A cycle is in flight.
    Syncing,
    /// The last cycle completed.
    Success,
    /// The last cycle failed; the next tick retries.
    Error,
    /// The enable-time probe failed. Terminal until re-enabled.
    NotAvailable,
}

impl SyncStatus {
    /// Returns true while work is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Initializing | SyncStatus::Syncing)
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Disabled => "disabled",
            SyncStatus::Initializing => "initializing",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::NotAvailable => "not_available",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What observers see of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Current status.
    pub status: SyncStatus,
    /// Whether sync is switched on.
    pub enabled: bool,
    /// Completion time of the last successful full or incremental sync.
    pub last_sync_time: Timestamp,
    /// Whether the remote store passed its probe.
    pub available: bool,
}

impl StatusSnapshot {
    /// The state of a freshly created scheduler.
    pub fn initial() -> Self {
        Self {
            status: SyncStatus::Disabled,
            enabled: false,
            last_sync_time: 0,
            available: false,
        }
    }
}

/// Settings persisted in the local store. Never synced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Whether sync was switched on.
    pub enabled: bool,
    /// Last successful sync, 0 if none.
    pub last_sync_time: Timestamp,
}

impl SyncSettings {
    /// Reads settings from their stored value.
    ///
    /// A missing or unreadable value yields the defaults.
    pub fn from_stored(value: Option<&Value>) -> Self {
        match value {
            None => Self::default(),
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable sync settings");
                Self::default()
            }),
        }
    }

    /// Serializes the settings for storage.
    pub fn to_value(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self).map_err(StorageError::from)?)
    }
}

/// Which sequence a cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Stale cleanup, full merge and full write-back.
    Full,
    /// Merge over recently modified items only.
    Incremental,
    /// Upload of one item's local value.
    Single,
}

/// What a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Sequence that ran.
    pub kind: SyncKind,
    /// Time the cycle started.
    pub started_at: Timestamp,
    /// Keys written to the local store.
    pub local_written: usize,
    /// Keys removed from the local store.
    pub local_removed: usize,
    /// Keys written to the remote store.
    pub remote_written: usize,
    /// Keys removed from the remote store by the merge.
    pub remote_removed: usize,
    /// Remote items removed by the stale cleanup pass.
    pub remote_stale_removed: usize,
    /// Items left off the remote store for exceeding the per-item ceiling.
    pub oversized: usize,
    /// Remote write batches issued.
    pub chunks: usize,
    /// Merge counters. Default for single uploads.
    pub merge: MergeReport,
}

impl SyncReport {
    /// Creates an empty report.
    pub fn new(kind: SyncKind, started_at: Timestamp) -> Self {
        Self {
            kind,
            started_at,
            local_written: 0,
            local_removed: 0,
            remote_written: 0,
            remote_removed: 0,
            remote_stale_removed: 0,
            oversized: 0,
            chunks: 0,
            merge: MergeReport::default(),
        }
    }

    /// Total keys touched in the remote store.
    pub fn remote_touched(&self) -> usize {
        self.remote_written + self.remote_removed + self.remote_stale_removed
    }
}

/// Statistics about scheduler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Cycles that completed.
    pub cycles_completed: u64,
    /// Cycles that failed.
    pub cycles_failed: u64,
    /// Single-item uploads that completed.
    pub uploads: u64,
    /// Remote notifications discarded as echoes of our own writes.
    pub echoes_ignored: u64,
    /// Remote notifications discarded by the listener throttle.
    pub throttled: u64,
    /// Triggers dropped because a cycle was in flight.
    pub busy_dropped: u64,
    /// Last error message.
    pub last_error: Option<String>,
}
