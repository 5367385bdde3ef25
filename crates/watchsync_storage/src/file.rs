//! JSON-document storage area for persistent storage.

use crate::area::StorageArea;
use crate::change::{ChangeFeed, ChangeReceiver, ChangeScope, ChangeSet};
use crate::error::StorageResult;
use crate::memory::AreaLimits;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use watchsync_protocol::RawSnapshot;

/// A storage area persisted as a single JSON object on disk.
///
/// The whole document is loaded on open and kept in memory. Every
/// successful mutation rewrites the document.
///
/// # Durability
///
/// Writes go to a sibling temporary file which is then renamed over the
/// original, so a crash leaves either the old or the new document.
///
/// # Example
///
/// ```no_run
/// use watchsync_storage::{ChangeScope, FileArea};
/// use std::path::Path;
///
/// let area = FileArea::open(Path::new("local.json"), ChangeScope::Local).unwrap();
/// assert!(area.path().ends_with("local.json"));
/// ```
#[derive(Debug)]
pub struct FileArea {
    path: PathBuf,
    scope: ChangeScope,
    limits: AreaLimits,
    data: RwLock<RawSnapshot>,
    feed: ChangeFeed,
}

impl FileArea {
    /// Opens the document at `path`, or starts empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object.
    pub fn open(path: &Path, scope: ChangeScope) -> StorageResult<Self> {
        Self::open_with_limits(path, scope, AreaLimits::unlimited())
    }

    /// Opens the document with size limits enforced on writes.
    ///
    /// # Errors
    ///
    /// See [`FileArea::open`].
    pub fn open_with_limits(
        path: &Path,
        scope: ChangeScope,
        limits: AreaLimits,
    ) -> StorageResult<Self> {
        let data = if path.exists() {
            let text = fs::read_to_string(path)?;
            if text.trim().is_empty() {
                RawSnapshot::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            RawSnapshot::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            scope,
            limits,
            data: RwLock::new(data),
            feed: ChangeFeed::new(),
        })
    }

    /// Returns the path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &RawSnapshot) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate(&self, apply: impl FnOnce(&mut RawSnapshot, &mut ChangeSet)) -> StorageResult<()> {
        let changes = {
            let mut data = self.data.write();
            let mut next = data.clone();
            let mut changes = ChangeSet::new(self.scope);
            apply(&mut next, &mut changes);
            if changes.is_empty() {
                return Ok(());
            }
            self.persist(&next)?;
            *data = next;
            changes
        };
        self.feed.emit(changes);
        Ok(())
    }
}

#[async_trait]
impl StorageArea for FileArea {
    async fn get(&self, keys: Option<&[String]>) -> StorageResult<RawSnapshot> {
        let data = self.data.read();
        Ok(match keys {
            None => data.clone(),
            Some(keys) => keys
                .iter()
                .filter_map(|k| data.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
        })
    }

    async fn set(&self, items: RawSnapshot) -> StorageResult<()> {
        {
            let data = self.data.read();
            let mut after = data.clone();
            after.extend(items.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.limits.check(&items, &after)?;
        }
        self.mutate(|data, changes| {
            for (key, value) in items {
                let old = data.insert(key.clone(), value.clone());
                changes.record(key, old, Some(value));
            }
        })
    }

    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        self.mutate(|data, changes| {
            for key in keys {
                if let Some(old) = data.remove(key) {
                    changes.record(key.clone(), Some(old), None);
                }
            }
        })
    }

    async fn clear(&self) -> StorageResult<()> {
        self.mutate(|data, changes| {
            for (key, old) in std::mem::take(data) {
                changes.record(key, Some(old), None);
            }
        })
    }

    fn watch(&self) -> ChangeReceiver {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use serde_json::json;
    use tempfile::tempdir;

    fn one(key: &str, value: serde_json::Value) -> RawSnapshot {
        let mut items = RawSnapshot::new();
        items.insert(key.to_string(), value);
        items
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let area = FileArea::open(&dir.path().join("none.json"), ChangeScope::Local).unwrap();
        assert!(area.get(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.json");

        {
            let area = FileArea::open(&path, ChangeScope::Local).unwrap();
            area.set(one("video_a", json!({"timestamp": 5}))).await.unwrap();
            area.set(one("video_b", json!({"timestamp": 6}))).await.unwrap();
            area.remove(&["video_b".to_string()]).await.unwrap();
        }

        let area = FileArea::open(&path, ChangeScope::Local).unwrap();
        let all = area.get(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["video_a"], json!({"timestamp": 5}));
    }

    #[tokio::test]
    async fn nested_directories_are_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("remote.json");
        let area = FileArea::open(&path, ChangeScope::Sync).unwrap();
        area.set(one("k", json!(1))).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn non_object_document_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = FileArea::open(&path, ChangeScope::Local).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn limits_apply_to_file_area() {
        let dir = tempdir().unwrap();
        let area = FileArea::open_with_limits(
            &dir.path().join("r.json"),
            ChangeScope::Sync,
            AreaLimits::new(10, 100),
        )
        .unwrap();
        let err = area
            .set(one("video_a", json!({"title": "too long"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ItemTooLarge { .. }));
    }

    #[tokio::test]
    async fn clear_notifies_watchers() {
        let dir = tempdir().unwrap();
        let area = FileArea::open(&dir.path().join("c.json"), ChangeScope::Local).unwrap();
        area.set(one("k", json!(1))).await.unwrap();
        let mut rx = area.watch();
        area.clear().await.unwrap();
        let set = rx.try_recv().unwrap();
        assert!(set.changes["k"].is_removal());
    }
}
