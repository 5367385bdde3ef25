//! Inspect command implementation.

use super::{format_size, read_document, CommandResult};
use serde::Serialize;
use std::path::Path;
use watchsync_engine::{HistoryCounts, SyncSettings, SETTINGS_KEY};
use watchsync_protocol::{batch_size, Namespace, Snapshot, Timestamp};

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Document path.
    pub path: String,
    /// Accounted size of every key and value.
    pub size: usize,
    /// Number of keys in the document.
    pub keys: usize,
    /// Video records.
    pub videos: usize,
    /// Playlist records.
    pub playlists: usize,
    /// Video tombstones.
    pub deleted_videos: usize,
    /// Playlist tombstones.
    pub deleted_playlists: usize,
    /// Item keys whose value could not be read.
    pub malformed: usize,
    /// Most recent record or tombstone time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<Timestamp>,
    /// Persisted sync settings, if the document holds any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsView>,
    /// Malformed item details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malformed_items: Option<Vec<String>>,
}

/// Sync settings as shown by the CLI.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    /// Whether sync was switched on.
    pub enabled: bool,
    /// Last successful sync in epoch milliseconds.
    pub last_sync_time: u64,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    namespace: Option<&str>,
    show_malformed: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, namespace, show_malformed)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

/// Reads and counts a store document.
pub fn inspect(
    path: &Path,
    namespace: Option<&str>,
    show_malformed: bool,
) -> CommandResult<InspectResult> {
    let raw = read_document(path)?;
    let snapshot = match namespace {
        Some(prefix) => Snapshot::parse_remote(&raw, &Namespace::new(prefix)),
        None => Snapshot::parse(&raw),
    };
    let counts = HistoryCounts::of(&snapshot);

    let settings = raw.get(SETTINGS_KEY).map(|value| {
        let settings = SyncSettings::from_stored(Some(value));
        SettingsView {
            enabled: settings.enabled,
            last_sync_time: settings.last_sync_time,
        }
    });

    let malformed_items = show_malformed.then(|| {
        snapshot
            .malformed()
            .iter()
            .map(ToString::to_string)
            .collect()
    });

    Ok(InspectResult {
        path: path.display().to_string(),
        size: batch_size(&raw),
        keys: raw.len(),
        videos: counts.videos,
        playlists: counts.playlists,
        deleted_videos: counts.deleted_videos,
        deleted_playlists: counts.deleted_playlists,
        malformed: counts.malformed,
        newest: snapshot.entries().map(|e| e.time).max(),
        settings,
        malformed_items,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("watchsync Store Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {}", format_size(result.size));
    println!("Keys: {}", result.keys);
    println!();
    println!("Records:");
    println!("  Videos:    {}", result.videos);
    println!("  Playlists: {}", result.playlists);
    println!();
    println!("Tombstones:");
    println!("  Videos:    {}", result.deleted_videos);
    println!("  Playlists: {}", result.deleted_playlists);
    println!();
    if let Some(newest) = result.newest {
        println!("Newest:    {newest}");
    }
    println!("Malformed: {}", result.malformed);
    if let Some(items) = &result.malformed_items {
        for item in items {
            println!("  {item}");
        }
    }

    if let Some(settings) = &result.settings {
        println!();
        println!("Sync:");
        println!("  Enabled:   {}", settings.enabled);
        println!("  Last sync: {}", settings.last_sync_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::write_document;
    use serde_json::json;
    use tempfile::tempdir;
    use watchsync_protocol::RawSnapshot;

    fn document(pairs: &[(&str, serde_json::Value)]) -> RawSnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn counts_local_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.json");
        write_document(
            &path,
            &document(&[
                ("video_a", json!({"timestamp": 1})),
                ("playlist_b", json!({"timestamp": 2})),
                ("deleted_video_c", json!({"deletedAt": 3})),
                ("video_", json!({"timestamp": 4})),
                (SETTINGS_KEY, json!({"enabled": true, "lastSyncTime": 9})),
            ]),
        )
        .unwrap();

        let result = inspect(&path, None, true).unwrap();
        assert_eq!(result.keys, 5);
        assert_eq!(result.videos, 1);
        assert_eq!(result.playlists, 1);
        assert_eq!(result.deleted_videos, 1);
        assert_eq!(result.malformed, 1);
        assert_eq!(result.newest, Some(3));
        assert_eq!(result.malformed_items.unwrap().len(), 1);

        let settings = result.settings.unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.last_sync_time, 9);
    }

    #[test]
    fn remote_document_is_read_through_namespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.json");
        write_document(
            &path,
            &document(&[
                ("ns_video_a", json!({"timestamp": 1})),
                ("ns_deleted_playlist_b", json!({"deletedAt": 2})),
            ]),
        )
        .unwrap();

        let result = inspect(&path, Some("ns_"), false).unwrap();
        assert_eq!(result.videos, 1);
        assert_eq!(result.deleted_playlists, 1);
        assert!(result.settings.is_none());
        assert!(result.malformed_items.is_none());
    }
}
