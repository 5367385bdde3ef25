//! Sync scheduler: owns sync state, timers and self-write suppression.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::cycle::Cycle;
use crate::error::{ErrorClass, SyncError, SyncResult};
use crate::notify::NotificationHub;
use crate::state::{
    StatusSnapshot, SyncKind, SyncReport, SyncSettings, SyncStats, SyncStatus, SETTINGS_KEY,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use watchsync_protocol::{duration_ms, ItemId, RawSnapshot, Timestamp};
use watchsync_storage::{ChangeSet, LocalStore, RemoteStore, StorageArea};

/// What the scheduler did with a remote change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChangeDecision {
    /// Sync is disabled or the notification was empty.
    Ignored,
    /// Arrived within the echo window of our own remote write.
    Echo,
    /// A listener-triggered sync ran too recently.
    Throttled,
    /// A cycle was already in flight.
    Busy,
    /// A sync ran and succeeded.
    Synced,
    /// A sync ran and failed.
    Failed,
}

/// The sync scheduler.
///
/// Exactly one cycle may be in flight at a time. A trigger arriving while
/// a cycle runs is dropped, not queued.
///
/// # Runtime
///
/// [`SyncScheduler::enable`] spawns the periodic timer and the remote
/// change listener onto the current tokio runtime. Both are aborted by
/// [`SyncScheduler::disable`] or when the scheduler is dropped.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use watchsync_engine::{SyncConfig, SyncScheduler, SyncStatus};
/// use watchsync_storage::{ChangeScope, InMemoryArea};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = SyncScheduler::new(
///     SyncConfig::default(),
///     Arc::new(InMemoryArea::new(ChangeScope::Local)),
///     Arc::new(InMemoryArea::new(ChangeScope::Sync)),
/// );
/// assert!(scheduler.enable().await);
/// assert_eq!(scheduler.status().status, SyncStatus::Success);
/// # }
/// ```
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    local: LocalStore,
    remote: RemoteStore,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    hub: NotificationHub,
    status: RwLock<StatusSnapshot>,
    in_flight: AtomicBool,
    last_remote_write: AtomicU64,
    last_listener_sync: AtomicU64,
    last_upload: AtomicU64,
    last_report: RwLock<Option<SyncReport>>,
    stats: RwLock<SyncStats>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncScheduler {
    /// Creates a scheduler over the two store backings, using the system
    /// clock.
    pub fn new(
        config: SyncConfig,
        local: Arc<dyn StorageArea>,
        remote: Arc<dyn StorageArea>,
    ) -> Self {
        Self::with_clock(config, local, remote, Arc::new(SystemClock))
    }

    /// Creates a scheduler with an explicit clock.
    pub fn with_clock(
        config: SyncConfig,
        local: Arc<dyn StorageArea>,
        remote: Arc<dyn StorageArea>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inner = Inner {
            local: LocalStore::new(local),
            remote: RemoteStore::new(remote, config.remote.clone()),
            config,
            clock,
            hub: NotificationHub::new(),
            status: RwLock::new(StatusSnapshot::initial()),
            in_flight: AtomicBool::new(false),
            last_remote_write: AtomicU64::new(0),
            last_listener_sync: AtomicU64::new(0),
            last_upload: AtomicU64::new(0),
            last_report: RwLock::new(None),
            stats: RwLock::new(SyncStats::default()),
            tasks: Mutex::new(Vec::new()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The local store adapter.
    pub fn local(&self) -> &LocalStore {
        &self.inner.local
    }

    /// The remote store adapter.
    pub fn remote(&self) -> &RemoteStore {
        &self.inner.remote
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Loads persisted settings and resumes sync if it was enabled.
    ///
    /// Returns whether sync is enabled afterwards.
    pub async fn initialize(&self) -> bool {
        self.inner.initialize().await
    }

    /// Probes the remote store, runs a full sync and starts the timer and
    /// listener.
    ///
    /// Returns false if the probe failed; status is then
    /// [`SyncStatus::NotAvailable`]. A failing first sync still enables
    /// sync with status [`SyncStatus::Error`].
    pub async fn enable(&self) -> bool {
        self.inner.enable().await
    }

    /// Stops the timer and listener and persists the disabled setting.
    ///
    /// Returns false if the setting could not be persisted.
    pub async fn disable(&self) -> bool {
        self.inner.disable().await
    }

    /// Runs an incremental sync if the last success is recent, otherwise a
    /// full sync.
    pub async fn trigger_sync(&self) -> bool {
        self.inner.trigger_sync().await
    }

    /// Runs a full sync.
    pub async fn trigger_full_sync(&self) -> bool {
        if !self.inner.enabled() {
            debug!("sync disabled; ignoring full sync trigger");
            return false;
        }
        self.inner.run_cycle(SyncKind::Full).await
    }

    /// Uploads one item's current local value without merging.
    pub async fn upload_single(&self, id: &ItemId) -> bool {
        self.inner.upload_single(id).await
    }

    /// Decides whether a remote change notification should trigger a sync,
    /// and runs it if so.
    pub async fn handle_remote_change(&self, changes: &ChangeSet) -> RemoteChangeDecision {
        self.inner.handle_remote_change(changes).await
    }

    /// Current status.
    pub fn status(&self) -> StatusSnapshot {
        *self.inner.status.read()
    }

    /// Registers a status callback.
    pub fn on_status_change<F>(&self, callback: F)
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        self.inner.hub.on_status_change(callback);
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self) -> UnboundedReceiver<StatusSnapshot> {
        self.inner.hub.subscribe()
    }

    /// Report of the last successful cycle or upload.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.inner.last_report.read().clone()
    }

    /// Activity counters.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Time of the last successful single-item upload, 0 if none.
    pub fn last_upload_time(&self) -> Timestamp {
        self.inner.last_upload.load(Ordering::SeqCst)
    }

    /// Time of our last write to the remote store, 0 if none.
    pub fn last_remote_write(&self) -> Timestamp {
        self.inner.last_remote_write.load(Ordering::SeqCst)
    }

    /// Returns true while the timer and listener tasks are running.
    pub fn is_running(&self) -> bool {
        self.inner.has_tasks()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.inner.stop_tasks();
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn enabled(&self) -> bool {
        self.status.read().enabled
    }

    fn last_sync_time(&self) -> Timestamp {
        self.status.read().last_sync_time
    }

    fn has_tasks(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    async fn initialize(self: &Arc<Self>) -> bool {
        let settings = match self.local.get_one(SETTINGS_KEY).await {
            Ok(value) => SyncSettings::from_stored(value.as_ref()),
            Err(e) => {
                warn!(error = %e, "could not read sync settings");
                SyncSettings::default()
            }
        };
        self.transition(|s| s.last_sync_time = settings.last_sync_time);

        if settings.enabled {
            info!("resuming sync");
            self.enable().await
        } else {
            self.transition(|s| s.status = SyncStatus::Disabled);
            false
        }
    }

    async fn enable(self: &Arc<Self>) -> bool {
        if self.enabled() && self.has_tasks() {
            return true;
        }
        self.transition(|s| s.status = SyncStatus::Initializing);

        let now = self.clock.now_ms();
        if let Err(e) = self.probe(now).await {
            warn!(error = %e, "remote store unavailable");
            self.stats.write().last_error = Some(e.to_string());
            self.transition(|s| {
                s.status = SyncStatus::NotAvailable;
                s.enabled = false;
                s.available = false;
            });
            return false;
        }
        self.transition(|s| {
            s.enabled = true;
            s.available = true;
        });

        let synced = self.run_cycle(SyncKind::Full).await;
        let settings = SyncSettings {
            enabled: true,
            last_sync_time: self.last_sync_time(),
        };
        if let Err(e) = self.persist_settings(settings).await {
            warn!(error = %e, "could not persist sync settings");
        }

        self.start_tasks();
        info!(synced, "sync enabled");
        true
    }

    async fn disable(&self) -> bool {
        self.stop_tasks();
        self.transition(|s| {
            s.enabled = false;
            s.status = SyncStatus::Disabled;
        });

        let settings = SyncSettings {
            enabled: false,
            last_sync_time: self.last_sync_time(),
        };
        match self.persist_settings(settings).await {
            Ok(()) => {
                info!("sync disabled");
                true
            }
            Err(e) => {
                warn!(error = %e, "could not persist sync settings");
                false
            }
        }
    }

    async fn probe(&self, token: Timestamp) -> SyncResult<()> {
        self.last_remote_write.store(token, Ordering::SeqCst);
        if self.remote.probe(token).await? {
            Ok(())
        } else {
            Err(SyncError::ProbeMismatch)
        }
    }

    async fn trigger_sync(&self) -> bool {
        if !self.enabled() {
            debug!("sync disabled; ignoring trigger");
            return false;
        }
        let kind = self.choose_kind(self.clock.now_ms());
        self.run_cycle(kind).await
    }

    fn choose_kind(&self, now: Timestamp) -> SyncKind {
        let last = self.last_sync_time();
        if last > 0 && now.saturating_sub(last) < duration_ms(self.config.incremental_threshold) {
            SyncKind::Incremental
        } else {
            SyncKind::Full
        }
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    fn cycle(&self, now: Timestamp) -> Cycle<'_> {
        Cycle {
            local: &self.local,
            remote: &self.remote,
            config: &self.config,
            now,
            last_sync: self.last_sync_time(),
            clock: self.clock.as_ref(),
            remote_write_at: &self.last_remote_write,
        }
    }

    async fn run_cycle(&self, kind: SyncKind) -> bool {
        let Some(_guard) = self.begin() else {
            debug!(?kind, "sync already in flight; dropping trigger");
            self.stats.write().busy_dropped += 1;
            return false;
        };
        self.transition(|s| s.status = SyncStatus::Syncing);

        let now = self.clock.now_ms();
        let cycle = self.cycle(now);
        debug!(?kind, now, last_sync = cycle.last_sync, "sync cycle starting");
        let result = match kind {
            SyncKind::Incremental => cycle.incremental().await,
            SyncKind::Full | SyncKind::Single => cycle.full().await,
        };
        let result = match result {
            Ok(report) => self.commit(now).await.map(|()| report),
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                info!(
                    kind = ?report.kind,
                    local_written = report.local_written,
                    local_removed = report.local_removed,
                    remote_written = report.remote_written,
                    remote_removed = report.remote_removed + report.remote_stale_removed,
                    chunks = report.chunks,
                    "sync finished"
                );
                self.stats.write().cycles_completed += 1;
                *self.last_report.write() = Some(report);
                self.transition(|s| {
                    s.last_sync_time = now;
                    if s.enabled {
                        s.status = SyncStatus::Success;
                    }
                });
                true
            }
            Err(e) => {
                self.fail(&e);
                false
            }
        }
    }

    /// Records a successful cycle's time in the persisted settings.
    async fn commit(&self, now: Timestamp) -> SyncResult<()> {
        let settings = SyncSettings {
            enabled: self.enabled(),
            last_sync_time: now,
        };
        self.persist_settings(settings).await
    }

    async fn upload_single(&self, id: &ItemId) -> bool {
        if !self.enabled() {
            debug!(%id, "sync disabled; not uploading");
            return false;
        }
        let Some(_guard) = self.begin() else {
            debug!(%id, "sync in flight; dropping upload");
            self.stats.write().busy_dropped += 1;
            return false;
        };

        let now = self.clock.now_ms();
        match self.cycle(now).upload_single(id).await {
            Ok(report) => {
                debug!(%id, chunks = report.chunks, "uploaded item");
                self.last_upload.store(now, Ordering::SeqCst);
                self.stats.write().uploads += 1;
                *self.last_report.write() = Some(report);
                true
            }
            Err(e) => {
                self.fail(&e);
                false
            }
        }
    }

    async fn handle_remote_change(&self, changes: &ChangeSet) -> RemoteChangeDecision {
        if !self.enabled() || changes.is_empty() {
            return RemoteChangeDecision::Ignored;
        }

        let now = self.clock.now_ms();
        let last_write = self.last_remote_write.load(Ordering::SeqCst);
        if within(now, last_write, self.config.echo_window) {
            debug!(
                keys = changes.len(),
                since_write_ms = now.saturating_sub(last_write),
                "ignoring echo of our own remote write"
            );
            self.stats.write().echoes_ignored += 1;
            return RemoteChangeDecision::Echo;
        }

        let last_listener = self.last_listener_sync.load(Ordering::SeqCst);
        if within(now, last_listener, self.config.listener_throttle) {
            debug!(keys = changes.len(), "remote change throttled");
            self.stats.write().throttled += 1;
            return RemoteChangeDecision::Throttled;
        }

        if self.in_flight.load(Ordering::SeqCst) {
            self.stats.write().busy_dropped += 1;
            return RemoteChangeDecision::Busy;
        }

        self.last_listener_sync.store(now, Ordering::SeqCst);
        debug!(keys = changes.len(), "remote change triggers sync");
        if self.run_cycle(self.choose_kind(now)).await {
            RemoteChangeDecision::Synced
        } else {
            RemoteChangeDecision::Failed
        }
    }

    fn fail(&self, error: &SyncError) {
        let class = error.class();
        self.stats.write().last_error = Some(error.to_string());
        if class == ErrorClass::Malformed {
            warn!(error = %error, "skipping malformed item");
            return;
        }
        warn!(error = %error, ?class, "sync failed");
        self.stats.write().cycles_failed += 1;
        self.transition(|s| {
            if s.enabled {
                s.status = SyncStatus::Error;
            }
        });
    }

    async fn persist_settings(&self, settings: SyncSettings) -> SyncResult<()> {
        let mut items = RawSnapshot::new();
        items.insert(SETTINGS_KEY.to_string(), settings.to_value()?);
        self.local.set(items).await?;
        Ok(())
    }

    /// Applies `update` and broadcasts the result if anything changed.
    fn transition(&self, update: impl FnOnce(&mut StatusSnapshot)) {
        let snapshot = {
            let mut status = self.status.write();
            let before = *status;
            update(&mut status);
            if *status == before {
                return;
            }
            *status
        };
        debug!(status = %snapshot.status, enabled = snapshot.enabled, "status changed");
        self.hub.broadcast(&snapshot);
    }

    fn start_tasks(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let timer = {
            let inner = Arc::clone(self);
            let period = self.config.sync_interval.max(Duration::from_millis(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    inner.trigger_sync().await;
                }
            })
        };

        let listener = {
            let inner = Arc::clone(self);
            let mut changes = self.remote.watch();
            tokio::spawn(async move {
                while let Some(set) = changes.recv().await {
                    let decision = inner.handle_remote_change(&set).await;
                    debug!(?decision, "remote change handled");
                }
            })
        };

        tasks.push(timer);
        tasks.push(listener);
    }

    fn stop_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

fn within(now: Timestamp, then: Timestamp, window: Duration) -> bool {
    then > 0 && now.saturating_sub(then) < duration_ms(window)
}
