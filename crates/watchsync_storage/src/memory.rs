//! In-memory storage area.

use crate::area::StorageArea;
use crate::change::{ChangeFeed, ChangeReceiver, ChangeScope, ChangeSet};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use watchsync_protocol::{batch_size, entry_size, RawSnapshot};

/// Size limits enforced by a storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AreaLimits {
    /// Per-item ceiling on key plus serialized value.
    pub max_item_bytes: Option<usize>,
    /// Ceiling on the total size of all items.
    pub quota_bytes: Option<usize>,
}

impl AreaLimits {
    /// No limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Both limits set.
    pub fn new(max_item_bytes: usize, quota_bytes: usize) -> Self {
        Self {
            max_item_bytes: Some(max_item_bytes),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Checks a pending write against the limits.
    ///
    /// `after` is the full contents the area would hold if the write
    /// succeeded.
    pub fn check(&self, items: &RawSnapshot, after: &RawSnapshot) -> StorageResult<()> {
        if let Some(limit) = self.max_item_bytes {
            for (key, value) in items {
                let size = entry_size(key, value);
                if size > limit {
                    return Err(StorageError::ItemTooLarge {
                        key: key.clone(),
                        size,
                        limit,
                    });
                }
            }
        }
        if let Some(quota) = self.quota_bytes {
            let needed = batch_size(after);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        Ok(())
    }
}

/// A storage area held entirely in memory.
///
/// Suitable for:
/// - Unit and integration tests (including failure injection)
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// The area is thread-safe and is normally shared as
/// `Arc<dyn StorageArea>` between several devices in tests.
#[derive(Debug)]
pub struct InMemoryArea {
    scope: ChangeScope,
    data: RwLock<RawSnapshot>,
    limits: AreaLimits,
    feed: ChangeFeed,
    available: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryArea {
    /// Creates an empty, unlimited area.
    pub fn new(scope: ChangeScope) -> Self {
        Self::with_limits(scope, AreaLimits::unlimited())
    }

    /// Creates an empty area with the given limits.
    pub fn with_limits(scope: ChangeScope, limits: AreaLimits) -> Self {
        Self {
            scope,
            data: RwLock::new(RawSnapshot::new()),
            limits,
            feed: ChangeFeed::new(),
            available: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Creates an unlimited area with pre-existing contents.
    pub fn with_data(scope: ChangeScope, data: RawSnapshot) -> Self {
        let area = Self::new(scope);
        *area.data.write() = data;
        area
    }

    /// Returns a copy of all contents without going through the trait.
    pub fn data(&self) -> RawSnapshot {
        self.data.read().clone()
    }

    /// Makes every operation fail with [`StorageError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes `set`, `remove` and `clear` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful mutating calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("storage area disabled".into()))
        }
    }

    fn check_writable(&self) -> StorageResult<()> {
        self.check_available()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("injected write failure")));
        }
        Ok(())
    }

    fn finish_write(&self, changes: ChangeSet) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.feed.emit(changes);
    }
}

#[async_trait]
impl StorageArea for InMemoryArea {
    async fn get(&self, keys: Option<&[String]>) -> StorageResult<RawSnapshot> {
        self.check_available()?;
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
        self.check_writable()?;
        let changes = {
            let mut data = self.data.write();
            let mut after = data.clone();
            after.extend(items.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.limits.check(&items, &after)?;

            let mut changes = ChangeSet::new(self.scope);
            for (key, value) in items {
                let old = data.insert(key.clone(), value.clone());
                changes.record(key, old, Some(value));
            }
            changes
        };
        self.finish_write(changes);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        self.check_writable()?;
        let changes = {
            let mut data = self.data.write();
            let mut changes = ChangeSet::new(self.scope);
            for key in keys {
                if let Some(old) = data.remove(key) {
                    changes.record(key.clone(), Some(old), None);
                }
            }
            changes
        };
        self.finish_write(changes);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.check_writable()?;
        let changes = {
            let mut data = self.data.write();
            let mut changes = ChangeSet::new(self.scope);
            for (key, old) in std::mem::take(&mut *data) {
                changes.record(key, Some(old), None);
            }
            changes
        };
        self.finish_write(changes);
        Ok(())
    }

    fn watch(&self) -> ChangeReceiver {
        self.feed.subscribe()
    }
}
