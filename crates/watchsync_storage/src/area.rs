//! Storage capability trait definition.

use crate::change::ChangeReceiver;
use crate::error::StorageResult;
use async_trait::async_trait;
use watchsync_protocol::RawSnapshot;

/// A key-value storage area holding JSON values.
///
/// The same capability backs both the local and the remote store; the two
/// differ only in configuration (namespace, size limits, quota), which the
/// adapters in this crate layer on top.
///
/// # Invariants
///
/// - Each key is an independent item: a partially applied `set` leaves
///   every key either fully old or fully new
/// - `get(None)` returns every key in the area
/// - A successful mutation is announced to all watchers as one
///   [`ChangeSet`](crate::ChangeSet) listing only keys whose value changed
///
/// # Implementors
///
/// - [`super::InMemoryArea`] - For tests and ephemeral use
/// - [`super::FileArea`] - JSON document on disk
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Reads the given keys, or everything when `keys` is `None`.
    ///
    /// Missing keys are absent from the result.
    async fn get(&self, keys: Option<&[String]>) -> StorageResult<RawSnapshot>;

    /// Writes every entry in `items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the area is unavailable, a limit would be
    /// exceeded, or the write fails.
    async fn set(&self, items: RawSnapshot) -> StorageResult<()>;

    /// Removes the given keys. Missing keys are ignored.
    async fn remove(&self, keys: &[String]) -> StorageResult<()>;

    /// Removes every key.
    async fn clear(&self) -> StorageResult<()>;

    /// Subscribes to change notifications.
    fn watch(&self) -> ChangeReceiver;
}
