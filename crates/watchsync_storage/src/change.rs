//! Change notifications emitted by storage areas.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Which store a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// The unconstrained local store.
    Local,
    /// The quota-limited shared store.
    Sync,
}

/// Old and new value of a single key.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    /// Value before the write, `None` if the key was absent.
    pub old: Option<Value>,
    /// Value after the write, `None` if the key was removed.
    pub new: Option<Value>,
}

impl StorageChange {
    /// Returns true if the key was removed.
    pub fn is_removal(&self) -> bool {
        self.new.is_none()
    }
}

/// All keys touched by a single store operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    /// Originating store.
    pub scope: ChangeScope,
    /// Per-key changes.
    pub changes: BTreeMap<String, StorageChange>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new(scope: ChangeScope) -> Self {
        Self {
            scope,
            changes: BTreeMap::new(),
        }
    }

    /// Records a change for `key`. No-op if old and new are equal.
    pub fn record(&mut self, key: impl Into<String>, old: Option<Value>, new: Option<Value>) {
        if old != new {
            self.changes.insert(key.into(), StorageChange { old, new });
        }
    }

    /// Returns true if no key changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed keys.
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Receiving end of a storage subscription. Dropping it unsubscribes.
pub type ChangeReceiver = UnboundedReceiver<ChangeSet>;

/// Distributes change sets to subscribers.
///
/// Subscribers whose receiver has been dropped are pruned on the next emit.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<UnboundedSender<ChangeSet>>>,
}

impl ChangeFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future change sets.
    pub fn subscribe(&self) -> ChangeReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends a change set to every live subscriber. Empty sets are dropped.
    pub fn emit(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(changes.clone()).is_ok());
    }

    /// Returns the number of live subscribers as of the last emit.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
