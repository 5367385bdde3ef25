//! Property-based test generators using proptest.
//!
//! Strategies produce store contents in the local key space. Ids are
//! drawn from a small alphabet so local and remote snapshots collide often.

use proptest::prelude::*;
use serde_json::{json, Value};
use watchsync_protocol::{ItemId, ItemKind, RawSnapshot, Timestamp};

/// Strategy for item kinds.
pub fn item_kind_strategy() -> impl Strategy<Value = ItemKind> {
    prop_oneof![Just(ItemKind::Video), Just(ItemKind::Playlist)]
}

/// Strategy for item ids from a small pool.
pub fn item_id_strategy() -> impl Strategy<Value = ItemId> {
    (
        item_kind_strategy(),
        prop::string::string_regex("[a-f]{1,2}").expect("Invalid regex"),
    )
        .prop_map(|(kind, id)| ItemId::new(kind, id))
}

/// Strategy for timestamps in `[0, max)`.
pub fn timestamp_strategy(max: Timestamp) -> impl Strategy<Value = Timestamp> {
    0..max.max(1)
}

/// Strategy for record values.
///
/// Some use `lastUpdated` instead of `timestamp`, and some carry both.
pub fn record_value_strategy(max: Timestamp) -> impl Strategy<Value = Value> {
    (
        timestamp_strategy(max),
        0u8..3,
        prop::string::string_regex("[A-Za-z ]{0,12}").expect("Invalid regex"),
    )
        .prop_map(|(time, shape, title)| match shape {
            0 => json!({ "title": title, "timestamp": time }),
            1 => json!({ "title": title, "lastUpdated": time }),
            _ => json!({ "title": title, "timestamp": time, "lastUpdated": time / 2 }),
        })
}

/// Strategy for tombstone values.
pub fn tombstone_value_strategy(max: Timestamp) -> impl Strategy<Value = Value> {
    timestamp_strategy(max).prop_map(|deleted_at| json!({ "deletedAt": deleted_at }))
}

/// Strategy for a store snapshot of records and tombstones.
pub fn snapshot_strategy(max: Timestamp, size: usize) -> impl Strategy<Value = RawSnapshot> {
    prop::collection::vec(
        (
            item_id_strategy(),
            any::<bool>(),
            record_value_strategy(max),
            tombstone_value_strategy(max),
        ),
        0..=size,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .map(|(id, deleted, record, tombstone)| {
                if deleted {
                    (id.tombstone_key().to_string(), tombstone)
                } else {
                    (id.record_key().to_string(), record)
                }
            })
            .collect()
    })
}

/// Strategy for a snapshot that also holds foreign and malformed keys.
pub fn noisy_snapshot_strategy(max: Timestamp, size: usize) -> impl Strategy<Value = RawSnapshot> {
    (snapshot_strategy(max, size), any::<bool>(), any::<bool>()).prop_map(
        |(mut snapshot, foreign, malformed)| {
            if foreign {
                snapshot.insert("sync_settings".into(), json!({ "enabled": true }));
            }
            if malformed {
                snapshot.insert("video_".into(), json!({ "timestamp": 1 }));
                snapshot.insert("deleted_video_zz".into(), json!({ "title": "no time" }));
            }
            snapshot
        },
    )
}

/// Strategy for a write batch of values with arbitrary sizes.
pub fn batch_strategy(size: usize, max_value_len: usize) -> impl Strategy<Value = RawSnapshot> {
    prop::collection::btree_map(
        prop::string::string_regex("video_[a-z0-9]{1,8}").expect("Invalid regex"),
        prop::string::string_regex(&format!("[a-z]{{0,{max_value_len}}}"))
            .expect("Invalid regex")
            .prop_map(|title| json!({ "title": title, "timestamp": 1 })),
        0..=size,
    )
}
