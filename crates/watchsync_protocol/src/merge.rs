//! Merge engine: reconciles a local and a remote snapshot.
//!
//! The merge is a pure function of its inputs. It runs in three steps:
//!
//! 1. **Staleness fail-safe.** If the last successful sync is older than
//!    [`MergePolicy::stale_after`], local state is discarded and the remote
//!    snapshot is returned as-is (in the local key space).
//! 2. **Tombstones.** For every id with a tombstone on either side the newer
//!    tombstone governs. Tombstones older than
//!    [`MergePolicy::tombstone_retention`] are purged; every other tombstone
//!    is kept and suppresses the id's record.
//! 3. **Records.** Each unsuppressed id keeps the record with the strictly
//!    greater effective time; ties keep the local copy.
//!
//! # Invariants
//!
//! - Every id that has a record on either side and is not suppressed by an
//!   unpurged tombstone appears exactly once in the output.
//! - A suppressed id never appears as a record, whatever its timestamps.
//! - Record values are copied verbatim from the winning side.

use crate::error::ProtocolError;
use crate::item::{duration_ms, Entry, RawSnapshot, Snapshot, Timestamp};
use crate::key::Namespace;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default retention for tombstones.
pub const DEFAULT_TOMBSTONE_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default age after which local state is considered too stale to merge.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(29 * 24 * 60 * 60);

/// Tunables for the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    /// Tombstones older than this are dropped from the output.
    pub tombstone_retention: Duration,
    /// Local state is discarded when the last sync is at least this old.
    pub stale_after: Duration,
    /// Namespace stripped from remote keys that still carry it.
    pub namespace: Namespace,
}

impl MergePolicy {
    /// Creates a policy with the default windows.
    pub fn new() -> Self {
        Self {
            tombstone_retention: DEFAULT_TOMBSTONE_RETENTION,
            stale_after: DEFAULT_STALE_AFTER,
            namespace: Namespace::default(),
        }
    }

    /// Sets the tombstone retention window.
    pub fn with_tombstone_retention(mut self, retention: Duration) -> Self {
        self.tombstone_retention = retention;
        self
    }

    /// Sets the staleness threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Sets the remote namespace.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Returns true if local state must be discarded.
    ///
    /// A `last_sync` of 0 means no sync ever completed; the fail-safe
    /// does not apply in that case.
    pub fn is_stale(&self, now: Timestamp, last_sync: Timestamp) -> bool {
        last_sync > 0 && now.saturating_sub(last_sync) >= duration_ms(self.stale_after)
    }

    /// Returns true if a tombstone deleted at `deleted_at` has expired.
    pub fn is_purged(&self, now: Timestamp, deleted_at: Timestamp) -> bool {
        now.saturating_sub(deleted_at) > duration_ms(self.tombstone_retention)
    }

    /// Merges two raw snapshots.
    ///
    /// `local` is keyed in the local key space; `remote` may be keyed either
    /// way. The output is keyed in the local key space.
    pub fn merge(
        &self,
        local: &RawSnapshot,
        remote: &RawSnapshot,
        now: Timestamp,
        last_sync: Timestamp,
    ) -> MergeOutcome {
        let local = Snapshot::parse(local);
        let remote = Snapshot::parse_remote(remote, &self.namespace);
        self.merge_snapshots(&local, &remote, now, last_sync)
    }

    /// Merges two parsed snapshots.
    pub fn merge_snapshots(
        &self,
        local: &Snapshot,
        remote: &Snapshot,
        now: Timestamp,
        last_sync: Timestamp,
    ) -> MergeOutcome {
        let mut report = MergeReport {
            malformed: local
                .malformed()
                .iter()
                .chain(remote.malformed())
                .cloned()
                .collect(),
            ..MergeReport::default()
        };

        if self.is_stale(now, last_sync) {
            report.fail_safe = true;
            for entry in remote.entries() {
                if entry.is_tombstone() {
                    report.tombstones_kept += 1;
                } else {
                    report.taken_remote += 1;
                }
            }
            return MergeOutcome {
                items: remote.to_raw(),
                report,
            };
        }

        let mut items = RawSnapshot::new();
        let mut ids = local.ids();
        ids.extend(remote.ids());

        for id in ids {
            let tombstone = newer(local.tombstone(&id), remote.tombstone(&id));
            let suppressed = match tombstone {
                Some(t) if !self.is_purged(now, t.time) => {
                    items.insert(t.key.to_string(), t.value.clone());
                    report.tombstones_kept += 1;
                    true
                }
                Some(_) => {
                    report.tombstones_purged += 1;
                    false
                }
                None => false,
            };

            let local_record = local.record(&id);
            let remote_record = remote.record(&id);

            if suppressed {
                if local_record.is_some() || remote_record.is_some() {
                    report.suppressed += 1;
                }
                continue;
            }

            let winner = match (local_record, remote_record) {
                (Some(l), Some(r)) if r.time > l.time => Some((r, Side::Remote)),
                (Some(l), _) => Some((l, Side::Local)),
                (None, Some(r)) => Some((r, Side::Remote)),
                (None, None) => None,
            };

            if let Some((entry, side)) = winner {
                match side {
                    Side::Local => report.kept_local += 1,
                    Side::Remote => report.taken_remote += 1,
                }
                items.insert(entry.key.to_string(), entry.value.clone());
            }
        }

        MergeOutcome { items, report }
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Side {
    Local,
    Remote,
}

/// Picks the entry with the greater time; ties go to `local`.
fn newer<'a>(local: Option<&'a Entry>, remote: Option<&'a Entry>) -> Option<&'a Entry> {
    match (local, remote) {
        (Some(l), Some(r)) if r.time > l.time => Some(r),
        (Some(l), _) => Some(l),
        (None, r) => r,
    }
}

/// Counters describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Records taken from the local side.
    pub kept_local: usize,
    /// Records taken from the remote side.
    pub taken_remote: usize,
    /// Ids whose records were hidden by a tombstone.
    pub suppressed: usize,
    /// Tombstones carried into the output.
    pub tombstones_kept: usize,
    /// Ids whose tombstones expired.
    pub tombstones_purged: usize,
    /// Items skipped because they were malformed.
    pub malformed: Vec<ProtocolError>,
    /// Whether the staleness fail-safe replaced local state.
    pub fail_safe: bool,
}

/// Result of a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Reconciled items, keyed in the local key space.
    pub items: RawSnapshot,
    /// What happened along the way.
    pub report: MergeReport,
}

/// Merges with the default [`MergePolicy`].
pub fn merge(
    local: &RawSnapshot,
    remote: &RawSnapshot,
    now: Timestamp,
    last_sync: Timestamp,
) -> RawSnapshot {
    MergePolicy::default()
        .merge(local, remote, now, last_sync)
        .items
}

/// Number of whole days between two timestamps, for log output.
pub fn age_days(now: Timestamp, then: Timestamp) -> u64 {
    now.saturating_sub(then) / duration_ms(DAY)
}
