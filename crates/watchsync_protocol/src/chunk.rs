//! Splitting write batches to fit the remote store's size limit.

use crate::item::RawSnapshot;
use serde_json::Value;

/// Size of a key/value pair as the remote store accounts it: key length
/// plus the length of the JSON-serialized value.
pub fn entry_size(key: &str, value: &Value) -> usize {
    key.len() + serde_json::to_string(value).map_or(0, |s| s.len())
}

/// Total accounted size of a batch.
pub fn batch_size(batch: &RawSnapshot) -> usize {
    batch.iter().map(|(k, v)| entry_size(k, v)).sum()
}

/// Splits `batch` into sub-batches of at most `max_bytes` each.
///
/// Packing is greedy in iteration order. A single entry larger than
/// `max_bytes` is never split; it gets a chunk of its own. Concatenating
/// the returned chunks reproduces `batch`.
pub fn chunk(batch: &RawSnapshot, max_bytes: usize) -> Vec<RawSnapshot> {
    chunk_entries(
        batch.iter().map(|(k, v)| (k.clone(), v.clone())),
        max_bytes,
    )
}

/// Like [`chunk`], charging `overhead` extra bytes per entry.
///
/// Use this when the keys will be rewritten before they reach the store,
/// e.g. with a namespace prefix of `overhead` bytes.
pub fn chunk_with_overhead(
    batch: &RawSnapshot,
    max_bytes: usize,
    overhead: usize,
) -> Vec<RawSnapshot> {
    pack(
        batch.iter().map(|(k, v)| (k.clone(), v.clone())),
        max_bytes,
        overhead,
    )
}

/// Like [`chunk`], consuming entries in the order given.
pub fn chunk_entries(
    entries: impl IntoIterator<Item = (String, Value)>,
    max_bytes: usize,
) -> Vec<RawSnapshot> {
    pack(entries, max_bytes, 0)
}

fn pack(
    entries: impl IntoIterator<Item = (String, Value)>,
    max_bytes: usize,
    overhead: usize,
) -> Vec<RawSnapshot> {
    let mut chunks = Vec::new();
    let mut current = RawSnapshot::new();
    let mut current_bytes = 0usize;

    for (key, value) in entries {
        let size = entry_size(&key, &value) + overhead;
        if !current.is_empty() && current_bytes + size > max_bytes {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.insert(key, value);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn padded(n: usize) -> Value {
        json!({ "title": "x".repeat(n) })
    }

    #[test]
    fn entry_size_counts_key_and_json() {
        // {"a":1} is 7 bytes
        assert_eq!(entry_size("video_1", &json!({"a": 1})), 7 + 7);
    }

    #[test]
    fn empty_batch_yields_no_chunks() {
        assert!(chunk(&RawSnapshot::new(), 100).is_empty());
    }

    #[test]
    fn small_batch_fits_in_one_chunk() {
        let mut batch = RawSnapshot::new();
        batch.insert("video_a".into(), json!({"timestamp": 1}));
        batch.insert("video_b".into(), json!({"timestamp": 2}));

        let chunks = chunk(&batch, 8000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], batch);
    }

    #[test]
    fn splits_when_limit_reached() {
        let mut batch = RawSnapshot::new();
        for i in 0..5 {
            batch.insert(format!("video_{i}"), padded(40));
        }
        let per_item = entry_size("video_0", &padded(40));

        let chunks = chunk(&batch, per_item * 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[2].len(), 1);
        for c in &chunks {
            assert!(batch_size(c) <= per_item * 2);
        }
    }

    #[test]
    fn oversized_item_gets_its_own_chunk() {
        let mut batch = RawSnapshot::new();
        batch.insert("video_a".into(), padded(10));
        batch.insert("video_b".into(), padded(500));
        batch.insert("video_c".into(), padded(10));

        let chunks = chunk(&batch, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].len(), 1);
        assert!(chunks[1].contains_key("video_b"));
    }

    #[test]
    fn overhead_is_charged_per_entry() {
        let mut batch = RawSnapshot::new();
        batch.insert("video_a".into(), padded(30));
        batch.insert("video_b".into(), padded(30));
        let limit = batch_size(&batch);

        assert_eq!(chunk_with_overhead(&batch, limit, 0).len(), 1);
        assert_eq!(chunk_with_overhead(&batch, limit, 3).len(), 2);
    }

    #[test]
    fn chunk_entries_preserves_given_order() {
        let entries = vec![
            ("video_z".to_string(), padded(30)),
            ("video_a".to_string(), padded(30)),
        ];
        let limit = entry_size("video_z", &padded(30));
        let chunks = chunk_entries(entries, limit);
        assert!(chunks[0].contains_key("video_z"));
        assert!(chunks[1].contains_key("video_a"));
    }

    proptest! {
        #[test]
        fn chunks_reassemble_and_respect_limit(
            sizes in prop::collection::vec(0usize..300, 0..40),
            max_bytes in 1usize..1000,
        ) {
            let batch: RawSnapshot = sizes
                .iter()
                .enumerate()
                .map(|(i, n)| (format!("video_{i}"), padded(*n)))
                .collect();

            let chunks = chunk(&batch, max_bytes);

            let mut rebuilt = RawSnapshot::new();
            for c in &chunks {
                prop_assert!(!c.is_empty());
                prop_assert!(c.len() == 1 || batch_size(c) <= max_bytes);
                for (k, v) in c {
                    prop_assert!(rebuilt.insert(k.clone(), v.clone()).is_none());
                }
            }
            prop_assert_eq!(rebuilt, batch);
        }
    }
}
