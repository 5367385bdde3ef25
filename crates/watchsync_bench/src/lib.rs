//! Benchmark utilities.

use rand::Rng;
use serde_json::{json, Value};
use watchsync_protocol::{Namespace, RawSnapshot, Timestamp};

/// One day in milliseconds.
pub const DAY_MS: Timestamp = 24 * 60 * 60 * 1000;

/// Generate a random lowercase title of the specified length.
pub fn random_title(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Generate a record value stamped somewhere in the week before `now`.
pub fn random_record(now: Timestamp, title_len: usize) -> Value {
    let mut rng = rand::thread_rng();
    let age = rng.gen_range(0..7 * DAY_MS);
    json!({
        "title": random_title(title_len),
        "time": rng.gen_range(0.0..3600.0),
        "duration": 3600.0,
        "timestamp": now.saturating_sub(age),
    })
}

/// Generate a local snapshot of `count` items, roughly one in ten deleted.
pub fn generate_snapshot(count: usize, now: Timestamp, title_len: usize) -> RawSnapshot {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            if rng.gen_ratio(1, 10) {
                let age = rng.gen_range(0..40 * DAY_MS);
                (
                    format!("deleted_video_{i}"),
                    json!({ "deletedAt": now.saturating_sub(age) }),
                )
            } else {
                (format!("video_{i}"), random_record(now, title_len))
            }
        })
        .collect()
}

/// Generate a local/remote pair sharing roughly `overlap` of their ids.
///
/// The remote side is keyed in the remote key space.
pub fn generate_pair(
    count: usize,
    overlap: f64,
    now: Timestamp,
) -> (RawSnapshot, RawSnapshot) {
    let local = generate_snapshot(count, now, 24);
    let namespace = Namespace::default();
    let shared = (count as f64 * overlap) as usize;

    let mut remote: RawSnapshot = local
        .iter()
        .take(shared)
        .map(|(key, _)| (namespace.apply(key), random_record(now, 24)))
        .collect();
    for i in 0..count - shared {
        remote.insert(
            namespace.apply(&format!("video_r{i}")),
            random_record(now, 24),
        );
    }
    (local, remote)
}
