//! Property-based tests for merge and chunking.

use proptest::prelude::*;
use watchsync_protocol::{
    batch_size, chunk, ItemKey, MergePolicy, Namespace, RawSnapshot, RecentWindow, Snapshot,
    Timestamp,
};
use watchsync_testkit::prelude::*;

const MAX_TS: Timestamp = 10_000;

fn namespaced(raw: &RawSnapshot) -> RawSnapshot {
    let ns = Namespace::default();
    raw.iter().map(|(k, v)| (ns.apply(k), v.clone())).collect()
}

proptest! {
    #[test]
    fn every_id_survives_exactly_once(
        local in snapshot_strategy(MAX_TS, 12),
        remote in snapshot_strategy(MAX_TS, 12),
    ) {
        let policy = MergePolicy::default();
        let out = policy.merge(&local, &namespaced(&remote), MAX_TS, 0);

        let merged = Snapshot::parse(&out.items);
        let mut expected = Snapshot::parse(&local).ids();
        expected.extend(Snapshot::parse(&remote).ids());

        prop_assert_eq!(merged.ids(), expected);
        for id in merged.ids() {
            let both = merged.record(&id).is_some() && merged.tombstone(&id).is_some();
            prop_assert!(!both, "{} has a record and a tombstone", id);
        }
        prop_assert!(!out.report.fail_safe);
    }

    #[test]
    fn surviving_record_is_the_newest(
        local in snapshot_strategy(MAX_TS, 12),
        remote in snapshot_strategy(MAX_TS, 12),
    ) {
        let out = MergePolicy::default().merge(&local, &remote, MAX_TS, 0);
        let merged = Snapshot::parse(&out.items);
        let local = Snapshot::parse(&local);
        let remote = Snapshot::parse(&remote);

        for id in merged.ids() {
            let Some(winner) = merged.record(&id) else { continue };
            match (local.record(&id), remote.record(&id)) {
                (Some(l), Some(r)) if r.time > l.time => prop_assert_eq!(&winner.value, &r.value),
                (Some(l), _) => prop_assert_eq!(&winner.value, &l.value),
                (None, Some(r)) => prop_assert_eq!(&winner.value, &r.value),
                (None, None) => prop_assert!(false, "{} appeared from nowhere", id),
            }
        }
    }

    #[test]
    fn merge_is_deterministic_and_idempotent(
        local in noisy_snapshot_strategy(MAX_TS, 10),
        remote in noisy_snapshot_strategy(MAX_TS, 10),
        last_sync in 0..MAX_TS,
    ) {
        let policy = MergePolicy::default();
        let first = policy.merge(&local, &remote, MAX_TS, last_sync);
        let second = policy.merge(&local, &remote, MAX_TS, last_sync);
        prop_assert_eq!(&first.items, &second.items);

        let again = policy.merge(&first.items, &first.items, MAX_TS, last_sync);
        prop_assert_eq!(&again.items, &first.items);
    }

    #[test]
    fn stale_device_takes_remote_verbatim(
        local in snapshot_strategy(MAX_TS, 10),
        remote in snapshot_strategy(MAX_TS, 10),
    ) {
        let now = 40 * DAY_MS;
        let out = MergePolicy::default().merge(&local, &namespaced(&remote), now, 1);
        prop_assert!(out.report.fail_safe);
        prop_assert_eq!(out.items, remote);
    }

    #[test]
    fn expired_tombstones_are_dropped(
        local in snapshot_strategy(MAX_TS, 10),
        remote in snapshot_strategy(MAX_TS, 10),
    ) {
        let now = 31 * DAY_MS + MAX_TS;
        let out = MergePolicy::default().merge(&local, &remote, now, now);
        let merged = Snapshot::parse(&out.items);
        prop_assert!(merged.entries().all(|e| !e.is_tombstone()));
    }

    #[test]
    fn recent_window_agrees_with_full_merge(
        local in snapshot_strategy(MAX_TS, 12),
        remote in snapshot_strategy(MAX_TS, 12),
        since in 0..MAX_TS,
    ) {
        let policy = MergePolicy::default();
        let full = policy.merge(&local, &remote, MAX_TS, 0);

        let window = RecentWindow::select(&Snapshot::parse(&local), &Snapshot::parse(&remote), since);
        let partial = policy.merge_snapshots(&window.local, &window.remote, MAX_TS, 0);

        let restricted: RawSnapshot = full
            .items
            .into_iter()
            .filter(|(k, _)| {
                ItemKey::parse(k).is_ok_and(|key| window.ids.contains(key.item_id()))
            })
            .collect();
        prop_assert_eq!(partial.items, restricted);
    }

    #[test]
    fn chunks_reassemble_within_bound(
        batch in batch_strategy(30, 400),
        max_bytes in 64usize..2_000,
    ) {
        let chunks = chunk(&batch, max_bytes);

        let mut rebuilt = RawSnapshot::new();
        for part in &chunks {
            prop_assert!(!part.is_empty());
            prop_assert!(part.len() == 1 || batch_size(part) <= max_bytes);
            rebuilt.extend(part.clone());
        }
        prop_assert_eq!(rebuilt, batch);
    }
}
