//! Chunk command implementation.

use super::{format_size, read_document};
use serde::Serialize;
use std::path::Path;
use watchsync_protocol::{batch_size, chunk, entry_size, Entry, RawSnapshot};
use watchsync_storage::RemoteLimits;

/// One planned write batch.
#[derive(Debug, Serialize)]
pub struct ChunkInfo {
    /// Number of entries.
    pub entries: usize,
    /// Accounted size in bytes.
    pub size: usize,
}

/// Chunk plan for a document.
#[derive(Debug, Serialize)]
pub struct ChunkPlan {
    /// Batch size limit used.
    pub max_bytes: usize,
    /// Items that would be uploaded.
    pub items: usize,
    /// Planned batches.
    pub chunks: Vec<ChunkInfo>,
    /// Items over the per-item ceiling, which stay local.
    pub oversized: Vec<String>,
}

/// Runs the chunk command.
pub fn run(path: &Path, max_bytes: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = read_document(path)?;
    let plan = plan(&raw, &RemoteLimits::default().with_max_batch_bytes(max_bytes));

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => print_text_output(&plan),
    }

    Ok(())
}

/// Plans the remote write batches for the items of `raw`.
pub fn plan(raw: &RawSnapshot, limits: &RemoteLimits) -> ChunkPlan {
    let mut oversized = Vec::new();
    let items: RawSnapshot = raw
        .iter()
        .filter(|(key, value)| Entry::from_stored(key, value).is_ok())
        .map(|(key, value)| (limits.namespace.apply(key), value.clone()))
        .filter(|(key, value)| {
            let fits = entry_size(key, value) <= limits.max_item_bytes;
            if !fits {
                oversized.push(key.clone());
            }
            fits
        })
        .collect();

    let chunks = chunk(&items, limits.max_batch_bytes)
        .iter()
        .map(|batch| ChunkInfo {
            entries: batch.len(),
            size: batch_size(batch),
        })
        .collect();

    ChunkPlan {
        max_bytes: limits.max_batch_bytes,
        items: items.len(),
        chunks,
        oversized,
    }
}

fn print_text_output(plan: &ChunkPlan) {
    println!("watchsync Chunk Plan");
    println!("====================");
    println!();
    println!("Batch limit: {}", format_size(plan.max_bytes));
    println!("Items:       {}", plan.items);
    println!("Batches:     {}", plan.chunks.len());
    println!();
    for (i, info) in plan.chunks.iter().enumerate() {
        println!(
            "  #{:<3} {:>4} entries  {}",
            i,
            info.entries,
            format_size(info.size)
        );
    }
    if !plan.oversized.is_empty() {
        println!();
        println!("Over the per-item ceiling (kept local):");
        for key in &plan.oversized {
            println!("  {key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_splits_and_flags_oversized_items() {
        let mut raw = RawSnapshot::new();
        for i in 0..3 {
            raw.insert(format!("video_{i}"), json!({ "title": "x".repeat(3000) }));
        }
        raw.insert("video_huge".into(), json!({ "title": "x".repeat(9000) }));
        raw.insert("sync_settings".into(), json!({ "enabled": true }));

        let plan = plan(&raw, &RemoteLimits::default());
        assert_eq!(plan.items, 3);
        assert_eq!(plan.chunks.len(), 2);
        assert_eq!(plan.oversized, vec!["ns_video_huge".to_string()]);
        assert!(plan.chunks.iter().all(|c| c.size <= 8000));
    }
}
