//! The sync sequences: full, incremental and single-item upload.
//!
//! A cycle is a strict sequence of awaited store calls. Within a cycle the
//! local write always precedes the remote write. A failing call aborts the
//! cycle; writes already completed stay in place, which is safe because
//! every key is an independent item.

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::{SyncKind, SyncReport};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use watchsync_protocol::{
    age_days, chunk_with_overhead, duration_ms, entry_size, Entry, ItemId, MergeReport, RawSnapshot,
    RecentWindow, Snapshot, Timestamp, WritePlan,
};
use watchsync_storage::{LocalStore, RemoteStore};

/// Everything one cycle needs, borrowed from the scheduler.
pub(crate) struct Cycle<'a> {
    pub local: &'a LocalStore,
    pub remote: &'a RemoteStore,
    pub config: &'a SyncConfig,
    pub now: Timestamp,
    pub last_sync: Timestamp,
    /// Read when a remote write is issued; `now` stays fixed for the cycle.
    pub clock: &'a dyn Clock,
    /// Updated just before every remote write, for echo suppression.
    pub remote_write_at: &'a AtomicU64,
}

impl Cycle<'_> {
    /// Stale cleanup, full merge, local write-back, then remote write-back.
    pub async fn full(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncKind::Full, self.now);
        report.remote_stale_removed = self.clean_stale_remote().await?;

        let local_raw = self.local.get(None).await?;
        let remote_raw = self.remote.get(None).await?;

        let outcome = self
            .config
            .merge
            .merge(&local_raw, &remote_raw, self.now, self.last_sync);
        log_merge(&outcome.report, self.now, self.last_sync);

        let local_plan = WritePlan::between(&local_raw, &outcome.items);
        self.apply_local(local_plan, &mut report).await?;

        let desired = self.syncable(&outcome.items, &mut report);
        let remote_plan = WritePlan::between(&remote_raw, &desired);
        self.apply_remote(remote_plan, &mut report).await?;

        report.merge = outcome.report;
        Ok(report)
    }

    /// Runs the merge rules over items touched within the recent window
    /// only, writing back just those ids.
    pub async fn incremental(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncKind::Incremental, self.now);

        let local = Snapshot::parse(&self.local.get(None).await?);
        let remote = Snapshot::parse_remote(
            &self.remote.get(None).await?,
            &self.config.remote.namespace,
        );

        let since = self
            .now
            .saturating_sub(duration_ms(self.config.recent_window));
        let window = RecentWindow::select(&local, &remote, since);
        if window.is_empty() {
            debug!("no items modified in the recent window");
            return Ok(report);
        }
        debug!(ids = window.ids.len(), "incremental sync window");

        let outcome =
            self.config
                .merge
                .merge_snapshots(&window.local, &window.remote, self.now, self.last_sync);
        log_merge(&outcome.report, self.now, self.last_sync);

        let local_plan = WritePlan::between(&window.local.to_raw(), &outcome.items);
        self.apply_local(local_plan, &mut report).await?;

        let desired = self.syncable(&outcome.items, &mut report);
        let remote_plan = WritePlan::between(&window.remote.to_raw(), &desired);
        self.apply_remote(remote_plan, &mut report).await?;

        report.merge = outcome.report;
        Ok(report)
    }

    /// Uploads the current local value of one item without merging.
    ///
    /// A local tombstone takes precedence over a local record and also
    /// removes the remote copy of the record.
    pub async fn upload_single(&self, id: &ItemId) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncKind::Single, self.now);
        let record_key = id.record_key().to_string();
        let tombstone_key = id.tombstone_key().to_string();
        let stored = self
            .local
            .get(Some(&[record_key.clone(), tombstone_key.clone()]))
            .await?;

        let mut plan = WritePlan::default();
        if let Some(value) = stored.get(&tombstone_key) {
            Entry::from_stored(&tombstone_key, value)?;
            plan.set.insert(tombstone_key, value.clone());
            plan.remove.push(record_key);
        } else if let Some(value) = stored.get(&record_key) {
            Entry::from_stored(&record_key, value)?;
            plan.set.insert(record_key, value.clone());
        } else {
            return Err(SyncError::NotFound(id.to_string()));
        }

        self.apply_remote(plan, &mut report).await?;
        Ok(report)
    }

    fn retention_cutoff(&self) -> Timestamp {
        self.now
            .saturating_sub(duration_ms(self.config.remote_retention))
    }

    fn mark_remote_write(&self) {
        self.remote_write_at
            .store(self.clock.now_ms(), Ordering::SeqCst);
    }

    async fn clean_stale_remote(&self) -> SyncResult<usize> {
        let cutoff = self.retention_cutoff();
        let stale: Vec<String> = self
            .remote
            .get(None)
            .await?
            .iter()
            .filter(|(key, value)| {
                Entry::from_stored(key, value).is_ok_and(|entry| entry.time < cutoff)
            })
            .map(|(key, _)| key.clone())
            .collect();

        if !stale.is_empty() {
            debug!(count = stale.len(), "removing stale remote items");
            self.mark_remote_write();
            self.remote.remove(&stale).await?;
        }
        Ok(stale.len())
    }

    /// The subset of `items` that belongs on the remote store.
    fn syncable(&self, items: &RawSnapshot, report: &mut SyncReport) -> RawSnapshot {
        let cutoff = self.retention_cutoff();
        let limits = &self.config.remote;
        items
            .iter()
            .filter(|(key, value)| {
                let Ok(entry) = Entry::from_stored(key, value) else {
                    return false;
                };
                if entry.time < cutoff {
                    return false;
                }
                if entry_size(&limits.namespace.apply(key), value) > limits.max_item_bytes {
                    warn!(key = %key, "item exceeds the remote item ceiling; keeping it local only");
                    report.oversized += 1;
                    return false;
                }
                true
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    async fn apply_local(&self, plan: WritePlan, report: &mut SyncReport) -> SyncResult<()> {
        let WritePlan { set, remove } = plan;
        let written = set.len();
        self.local.set(set).await?;
        report.local_written = written;
        self.local.remove(&remove).await?;
        report.local_removed = remove.len();
        Ok(())
    }

    async fn apply_remote(&self, plan: WritePlan, report: &mut SyncReport) -> SyncResult<()> {
        if plan.is_empty() {
            return Ok(());
        }
        self.mark_remote_write();

        // Batches are measured with the prefix the remote store adds.
        let prefix = self.config.remote.namespace.prefix().len();
        for batch in chunk_with_overhead(&plan.set, self.config.remote.max_batch_bytes, prefix) {
            let len = batch.len();
            self.remote.set(batch).await?;
            report.remote_written += len;
            report.chunks += 1;
        }
        self.remote.remove(&plan.remove).await?;
        report.remote_removed += plan.remove.len();
        Ok(())
    }
}

fn log_merge(report: &MergeReport, now: Timestamp, last_sync: Timestamp) {
    for err in &report.malformed {
        warn!(error = %err, "skipping malformed item");
    }
    if report.fail_safe {
        warn!(
            days = age_days(now, last_sync),
            "last sync too long ago; replacing local state with remote"
        );
    }
    debug!(
        kept_local = report.kept_local,
        taken_remote = report.taken_remote,
        suppressed = report.suppressed,
        tombstones_kept = report.tombstones_kept,
        tombstones_purged = report.tombstones_purged,
        "merge finished"
    );
}
