//! Integration tests: several devices sharing one remote store.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use watchsync_engine::{
    Clock, LocalHistory, ManualClock, RemoteChangeDecision, SyncConfig, SyncKind, SyncScheduler,
    SyncStatus,
};
use watchsync_protocol::{ItemId, RawSnapshot, Timestamp};
use watchsync_storage::{
    ChangeReceiver, ChangeScope, ChangeSet, InMemoryArea, StorageArea, StorageResult,
};
use watchsync_testkit::prelude::*;

const START: Timestamp = 1_700_000_000_000;

/// One installation: its own local store, the shared remote, a shared clock.
struct Device {
    scheduler: SyncScheduler,
    local: Arc<InMemoryArea>,
    history: LocalHistory,
}

fn device(remote: &Arc<InMemoryArea>, clock: &Arc<ManualClock>) -> Device {
    let local = local_area();
    let scheduler = SyncScheduler::with_clock(
        SyncConfig::default(),
        local.clone(),
        remote.clone(),
        clock.clone(),
    );
    let history = LocalHistory::new(scheduler.local().clone());
    Device {
        scheduler,
        local,
        history,
    }
}

/// Remote area whose reads each take 30 s of clock time.
struct SlowReads {
    inner: Arc<InMemoryArea>,
    clock: Arc<ManualClock>,
}

#[async_trait]
impl StorageArea for SlowReads {
    async fn get(&self, keys: Option<&[String]>) -> StorageResult<RawSnapshot> {
        self.clock.advance(Duration::from_secs(30));
        self.inner.get(keys).await
    }

    async fn set(&self, items: RawSnapshot) -> StorageResult<()> {
        self.inner.set(items).await
    }

    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        self.inner.remove(keys).await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.inner.clear().await
    }

    fn watch(&self) -> ChangeReceiver {
        self.inner.watch()
    }
}

fn remote_change(key: &str) -> ChangeSet {
    let mut set = ChangeSet::new(ChangeScope::Sync);
    set.record(key, None, Some(record(1)));
    set
}

#[tokio::test]
async fn two_devices_converge() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    let b = device(&remote, &clock);

    a.history
        .save(&ItemId::video("v1"), json!({"title": "Pilot"}), clock.now_ms())
        .await
        .unwrap();
    assert!(a.scheduler.enable().await);
    assert!(remote.data().contains_key("ns_video_v1"));

    clock.advance(Duration::from_secs(30));
    assert!(b.scheduler.enable().await);

    let pulled = b.history.get(&ItemId::video("v1")).await.unwrap().unwrap();
    assert_eq!(pulled["title"], json!("Pilot"));
    assert_eq!(b.scheduler.status().status, SyncStatus::Success);
}

#[tokio::test]
async fn newer_remote_edit_wins_on_both_devices() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    let b = device(&remote, &clock);
    let id = ItemId::video("v1");

    a.history
        .save(&id, json!({"time": 10.0}), clock.now_ms())
        .await
        .unwrap();
    a.scheduler.enable().await;
    b.scheduler.enable().await;

    clock.advance(Duration::from_secs(600));
    b.history
        .save(&id, json!({"time": 42.0}), clock.now_ms())
        .await
        .unwrap();
    assert!(b.scheduler.trigger_sync().await);

    clock.advance(Duration::from_secs(600));
    assert!(a.scheduler.trigger_sync().await);
    let value = a.history.get(&id).await.unwrap().unwrap();
    assert_eq!(value["time"], json!(42.0));
}

#[tokio::test]
async fn deletion_propagates_through_tombstones() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    let b = device(&remote, &clock);
    let id = ItemId::video("v1");

    a.history.save(&id, json!({}), clock.now_ms()).await.unwrap();
    a.scheduler.enable().await;
    b.scheduler.enable().await;
    assert!(b.local.data().contains_key("video_v1"));

    clock.advance(Duration::from_secs(600));
    a.history.delete(&id, clock.now_ms()).await.unwrap();
    assert!(a.scheduler.trigger_full_sync().await);

    let shared = remote.data();
    assert!(shared.contains_key("ns_deleted_video_v1"));
    assert!(!shared.contains_key("ns_video_v1"));

    assert!(b.scheduler.trigger_full_sync().await);
    let counts = b.history.counts().await.unwrap();
    assert_eq!(counts.videos, 0);
    assert_eq!(counts.deleted_videos, 1);
}

#[tokio::test]
async fn self_write_echo_is_ignored_then_processed() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    a.scheduler.enable().await;

    clock.advance(Duration::from_secs(60));
    let id = ItemId::video("v2");
    a.history.save(&id, json!({}), clock.now_ms()).await.unwrap();
    assert!(a.scheduler.upload_single(&id).await);
    assert_eq!(a.scheduler.last_remote_write(), clock.now_ms());
    assert_eq!(a.scheduler.last_upload_time(), clock.now_ms());

    let change = remote_change("video_v2");
    clock.advance(Duration::from_secs(5));
    assert_eq!(
        a.scheduler.handle_remote_change(&change).await,
        RemoteChangeDecision::Echo
    );

    clock.advance(Duration::from_secs(20));
    assert_eq!(
        a.scheduler.handle_remote_change(&change).await,
        RemoteChangeDecision::Synced
    );
    assert_eq!(a.scheduler.stats().echoes_ignored, 1);
}

#[tokio::test]
async fn echo_window_starts_at_the_write_not_the_cycle() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let slow = Arc::new(SlowReads {
        inner: remote.clone(),
        clock: clock.clone(),
    });
    let scheduler = SyncScheduler::with_clock(
        SyncConfig::default(),
        local_area(),
        slow,
        clock.clone(),
    );
    let history = LocalHistory::new(scheduler.local().clone());
    assert!(scheduler.enable().await);

    clock.advance(Duration::from_secs(600));
    let id = ItemId::video("v1");
    history.save(&id, json!({}), clock.now_ms()).await.unwrap();
    let started = clock.now_ms();
    assert!(scheduler.trigger_full_sync().await);

    // Stale cleanup and the snapshot read both hit the slow area.
    assert_eq!(scheduler.last_remote_write(), started + 60_000);
    assert!(remote.data().contains_key("ns_video_v1"));

    clock.advance(Duration::from_secs(5));
    assert_eq!(
        scheduler.handle_remote_change(&remote_change("video_v1")).await,
        RemoteChangeDecision::Echo
    );
}

#[tokio::test]
async fn listener_syncs_are_throttled() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    a.scheduler.enable().await;

    let change = remote_change("video_x");
    clock.advance(Duration::from_secs(30));
    assert_eq!(
        a.scheduler.handle_remote_change(&change).await,
        RemoteChangeDecision::Synced
    );

    clock.advance(Duration::from_secs(60));
    assert_eq!(
        a.scheduler.handle_remote_change(&change).await,
        RemoteChangeDecision::Throttled
    );

    clock.advance(Duration::from_secs(5 * 60));
    assert_eq!(
        a.scheduler.handle_remote_change(&change).await,
        RemoteChangeDecision::Synced
    );
    assert_eq!(a.scheduler.stats().throttled, 1);
}

#[tokio::test]
async fn resaving_after_a_synced_delete_stays_deleted() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    let id = ItemId::video("v1");

    a.history.save(&id, json!({}), clock.now_ms()).await.unwrap();
    a.scheduler.enable().await;

    clock.advance(Duration::from_secs(600));
    a.history.delete(&id, clock.now_ms()).await.unwrap();
    assert!(a.scheduler.trigger_full_sync().await);
    assert!(remote.data().contains_key("ns_deleted_video_v1"));

    clock.advance(Duration::from_secs(600));
    a.history.save(&id, json!({"title": "again"}), clock.now_ms()).await.unwrap();
    assert!(a.history.get(&id).await.unwrap().is_some());
    assert!(a.scheduler.trigger_full_sync().await);

    assert!(a.history.get(&id).await.unwrap().is_none());
    let counts = a.history.counts().await.unwrap();
    assert_eq!(counts.videos, 0);
    assert_eq!(counts.deleted_videos, 1);
    assert!(!remote.data().contains_key("ns_video_v1"));
}

#[tokio::test]
async fn background_listener_pulls_remote_changes() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    let b = device(&remote, &clock);
    a.scheduler.enable().await;

    clock.advance(Duration::from_secs(30));
    b.scheduler.enable().await;
    let id = ItemId::playlist("p1");
    b.history
        .save(&id, json!({"title": "Mix"}), clock.now_ms())
        .await
        .unwrap();
    assert!(b.scheduler.upload_single(&id).await);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !a.local.data().contains_key("playlist_p1") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("device a never pulled the playlist");

    assert_eq!(
        a.scheduler.last_report().unwrap().kind,
        SyncKind::Incremental
    );
}

#[tokio::test]
async fn stale_device_adopts_remote_state() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    remote
        .set(snapshot(&[("ns_video_r", record(START - DAY_MS))]))
        .await
        .unwrap();

    let a = device(&remote, &clock);
    a.local
        .set(snapshot(&[
            ("video_l", record(START - 1000)),
            (
                "sync_settings",
                json!({"enabled": true, "lastSyncTime": START - 30 * DAY_MS}),
            ),
        ]))
        .await
        .unwrap();

    assert!(a.scheduler.initialize().await);

    let data = a.local.data();
    assert!(data.contains_key("video_r"));
    assert!(!data.contains_key("video_l"));
    assert!(a.scheduler.last_report().unwrap().merge.fail_safe);
    assert_eq!(a.scheduler.status().last_sync_time, START);
}

#[tokio::test]
async fn quota_exhaustion_is_a_transient_error() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);
    a.scheduler.enable().await;

    let title = "x".repeat(6000);
    for i in 0..20 {
        a.history
            .save(
                &ItemId::video(format!("big{i}")),
                json!({ "title": title }),
                clock.now_ms(),
            )
            .await
            .unwrap();
    }

    clock.advance(Duration::from_secs(600));
    assert!(!a.scheduler.trigger_sync().await);

    let status = a.scheduler.status();
    assert_eq!(status.status, SyncStatus::Error);
    assert!(status.enabled);
    assert_eq!(status.last_sync_time, START);
    assert_eq!(a.scheduler.stats().cycles_failed, 1);
}

#[tokio::test]
async fn observers_see_every_transition() {
    let remote = shared_remote();
    let clock = Arc::new(ManualClock::new(START));
    let a = device(&remote, &clock);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    a.scheduler.on_status_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut rx = a.scheduler.subscribe();

    a.scheduler.enable().await;

    let mut seen = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        seen.push(snapshot.status);
    }
    assert_eq!(seen.first(), Some(&SyncStatus::Initializing));
    assert!(seen.contains(&SyncStatus::Syncing));
    assert_eq!(seen.last(), Some(&SyncStatus::Success));
    assert_eq!(calls.load(Ordering::SeqCst), seen.len());
}

#[tokio::test]
async fn settings_survive_restart() {
    let stores = TempStores::new();
    let clock = Arc::new(ManualClock::new(START));

    {
        let scheduler = SyncScheduler::with_clock(
            SyncConfig::default(),
            stores.local.clone(),
            stores.remote.clone(),
            clock.clone(),
        );
        assert!(scheduler.enable().await);
    }

    clock.advance(Duration::from_secs(3600));
    let restarted = SyncScheduler::with_clock(
        SyncConfig::default(),
        stores.reopen_local(),
        stores.remote.clone(),
        clock.clone(),
    );
    assert_eq!(restarted.status().status, SyncStatus::Disabled);
    assert!(restarted.initialize().await);
    assert_eq!(restarted.status().status, SyncStatus::Success);
    assert_eq!(restarted.status().last_sync_time, clock.now_ms());

    assert!(restarted.disable().await);
    drop(restarted);

    let again = SyncScheduler::with_clock(
        SyncConfig::default(),
        stores.reopen_local(),
        stores.remote.clone(),
        clock.clone(),
    );
    assert!(!again.initialize().await);
    assert_eq!(again.status().status, SyncStatus::Disabled);
    assert_eq!(again.status().last_sync_time, clock.now_ms());
}
