//! Adapter over the quota-limited, eventually consistent shared store.

use crate::area::StorageArea;
use crate::change::{ChangeReceiver, ChangeSet};
use crate::error::{StorageError, StorageResult};
use crate::memory::AreaLimits;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use watchsync_protocol::{entry_size, Namespace, RawSnapshot};

/// Key written and deleted by [`RemoteStore::probe`].
pub const PROBE_KEY: &str = "__watchsync_probe__";

/// Limits and namespace of the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLimits {
    /// Prefix applied to every remote key.
    pub namespace: Namespace,
    /// Per-item ceiling on key plus serialized value.
    pub max_item_bytes: usize,
    /// Target size of a single write batch.
    pub max_batch_bytes: usize,
    /// Store-wide quota.
    pub quota_bytes: usize,
}

impl RemoteLimits {
    /// Creates the default limits.
    pub fn new() -> Self {
        Self {
            namespace: Namespace::default(),
            max_item_bytes: 8192,
            max_batch_bytes: 8000,
            quota_bytes: 102_400,
        }
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Sets the per-item ceiling.
    pub fn with_max_item_bytes(mut self, bytes: usize) -> Self {
        self.max_item_bytes = bytes;
        self
    }

    /// Sets the batch size used when chunking writes.
    pub fn with_max_batch_bytes(mut self, bytes: usize) -> Self {
        self.max_batch_bytes = bytes;
        self
    }

    /// Sets the store-wide quota.
    pub fn with_quota_bytes(mut self, bytes: usize) -> Self {
        self.quota_bytes = bytes;
        self
    }

    /// The limits a backing area should enforce to model this store.
    pub fn area_limits(&self) -> AreaLimits {
        AreaLimits::new(self.max_item_bytes, self.quota_bytes)
    }
}

impl Default for RemoteLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote store adapter.
///
/// Every key read or written is transparently prefixed with the namespace.
/// Results handed back to callers are in the local key space, with keys
/// from outside the namespace dropped.
#[derive(Clone)]
pub struct RemoteStore {
    area: Arc<dyn StorageArea>,
    limits: RemoteLimits,
}

impl RemoteStore {
    /// Wraps a storage area.
    pub fn new(area: Arc<dyn StorageArea>, limits: RemoteLimits) -> Self {
        Self { area, limits }
    }

    /// Returns the configured limits.
    pub fn limits(&self) -> &RemoteLimits {
        &self.limits
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.limits.namespace
    }

    /// Reads the given (bare) keys, or the whole namespace.
    pub async fn get(&self, keys: Option<&[String]>) -> StorageResult<RawSnapshot> {
        let ns = self.namespace();
        let raw = match keys {
            Some(keys) => {
                let prefixed: Vec<String> = keys.iter().map(|k| ns.apply(k)).collect();
                self.area.get(Some(&prefixed)).await?
            }
            None => self.area.get(None).await?,
        };
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| ns.strip(&k).map(|bare| (bare.to_string(), v)))
            .collect())
    }

    /// Writes `items` (bare keys) into the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ItemTooLarge`] without writing anything if
    /// any prefixed item exceeds the per-item ceiling; quota failures from
    /// the backing area are passed through.
    pub async fn set(&self, items: RawSnapshot) -> StorageResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let ns = self.namespace();
        let mut prefixed = RawSnapshot::new();
        for (key, value) in items {
            let key = ns.apply(&key);
            let size = entry_size(&key, &value);
            if size > self.limits.max_item_bytes {
                return Err(StorageError::ItemTooLarge {
                    key,
                    size,
                    limit: self.limits.max_item_bytes,
                });
            }
            prefixed.insert(key, value);
        }
        debug!(count = prefixed.len(), "remote set");
        self.area.set(prefixed).await
    }

    /// Removes the given (bare) keys from the namespace.
    pub async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let ns = self.namespace();
        let prefixed: Vec<String> = keys.iter().map(|k| ns.apply(k)).collect();
        debug!(count = prefixed.len(), "remote remove");
        self.area.remove(&prefixed).await
    }

    /// Removes every key in the namespace, leaving other keys alone.
    pub async fn clear(&self) -> StorageResult<()> {
        let keys: Vec<String> = self.get(None).await?.into_keys().collect();
        self.remove(&keys).await
    }

    /// Subscribes to remote changes, translated into the local key space.
    pub fn watch(&self) -> RemoteChanges {
        RemoteChanges {
            rx: self.area.watch(),
            namespace: self.limits.namespace.clone(),
        }
    }

    /// Checks that the store accepts a write, returns it on read and
    /// deletes it.
    ///
    /// `token` is written as the probe value. Returns whether it read back
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Any failure of the write, read or delete.
    pub async fn probe(&self, token: u64) -> StorageResult<bool> {
        let expected = json!({ "probe": token });
        let mut items = RawSnapshot::new();
        items.insert(PROBE_KEY.to_string(), expected.clone());
        self.set(items).await?;

        let keys = [PROBE_KEY.to_string()];
        let read: Option<Value> = self.get(Some(&keys)).await?.remove(PROBE_KEY);
        self.remove(&keys).await?;

        Ok(read.as_ref() == Some(&expected))
    }
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Remote change subscription in the local key space.
#[derive(Debug)]
pub struct RemoteChanges {
    rx: ChangeReceiver,
    namespace: Namespace,
}

impl RemoteChanges {
    /// Waits for the next change set touching the namespace.
    ///
    /// Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<ChangeSet> {
        loop {
            let raw = self.rx.recv().await?;
            let local = self.localize(raw);
            if !local.is_empty() {
                return Some(local);
            }
        }
    }

    /// Returns a pending change set without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeSet> {
        while let Ok(raw) = self.rx.try_recv() {
            let local = self.localize(raw);
            if !local.is_empty() {
                return Some(local);
            }
        }
        None
    }

    fn localize(&self, raw: ChangeSet) -> ChangeSet {
        let mut local = ChangeSet::new(raw.scope);
        for (key, change) in raw.changes {
            if let Some(bare) = self.namespace.strip(&key) {
                local.changes.insert(bare.to_string(), change);
            }
        }
        local
    }
}
