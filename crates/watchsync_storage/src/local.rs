//! Adapter over the unconstrained local store.

use crate::area::StorageArea;
use crate::change::ChangeReceiver;
use crate::error::StorageResult;
use serde_json::Value;
use std::sync::Arc;
use watchsync_protocol::RawSnapshot;

/// Local store adapter.
///
/// A thin pass-through: keys are not transformed and errors surface
/// unchanged.
#[derive(Clone)]
pub struct LocalStore {
    area: Arc<dyn StorageArea>,
}

impl LocalStore {
    /// Wraps a storage area.
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }

    /// Reads the given keys, or everything.
    pub async fn get(&self, keys: Option<&[String]>) -> StorageResult<RawSnapshot> {
        self.area.get(keys).await
    }

    /// Reads a single key.
    pub async fn get_one(&self, key: &str) -> StorageResult<Option<Value>> {
        let keys = [key.to_string()];
        Ok(self.area.get(Some(&keys)).await?.remove(key))
    }

    /// Writes every entry in `items`. An empty batch is a no-op.
    pub async fn set(&self, items: RawSnapshot) -> StorageResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.area.set(items).await
    }

    /// Removes the given keys. An empty list is a no-op.
    pub async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.area.remove(keys).await
    }

    /// Removes every key.
    pub async fn clear(&self) -> StorageResult<()> {
        self.area.clear().await
    }

    /// Subscribes to local change notifications.
    pub fn watch(&self) -> ChangeReceiver {
        self.area.watch()
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}
