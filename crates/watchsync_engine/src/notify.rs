//! Status broadcasting to external observers.
//!
//! Observers either register a callback or subscribe to a channel. Delivery
//! is best-effort: having no observers is not an error, and subscribers
//! whose receiver was dropped are pruned on the next broadcast.

use crate::state::StatusSnapshot;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Callback invoked on every status transition.
pub type StatusCallback = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;

/// Fan-out point for status transitions.
#[derive(Default)]
pub struct NotificationHub {
    callbacks: RwLock<Vec<StatusCallback>>,
    subscribers: RwLock<Vec<UnboundedSender<StatusSnapshot>>>,
}

impl NotificationHub {
    /// Creates a hub with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback.
    pub fn on_status_change<F>(&self, callback: F)
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Subscribes to status transitions. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> UnboundedReceiver<StatusSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Delivers `snapshot` to every observer. Returns how many received it.
    pub fn broadcast(&self, snapshot: &StatusSnapshot) -> usize {
        // Callbacks run outside the lock so they may register more observers.
        let callbacks: Vec<StatusCallback> = self.callbacks.read().clone();
        for callback in &callbacks {
            callback(snapshot);
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(*snapshot).is_ok());
        callbacks.len() + subscribers.len()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.callbacks.read().len() + self.subscribers.read().len()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SyncStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(status: SyncStatus) -> StatusSnapshot {
        StatusSnapshot {
            status,
            ..StatusSnapshot::initial()
        }
    }

    #[test]
    fn no_observers_is_fine() {
        let hub = NotificationHub::new();
        assert_eq!(hub.broadcast(&snapshot(SyncStatus::Success)), 0);
    }

    #[test]
    fn callbacks_and_subscribers_both_receive() {
        let hub = NotificationHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        hub.on_status_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let mut rx = hub.subscribe();

        assert_eq!(hub.broadcast(&snapshot(SyncStatus::Syncing)), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap().status, SyncStatus::Syncing);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = NotificationHub::new();
        let rx = hub.subscribe();
        let mut kept = hub.subscribe();
        drop(rx);

        assert_eq!(hub.broadcast(&snapshot(SyncStatus::Error)), 1);
        assert_eq!(hub.observer_count(), 1);
        assert_eq!(kept.try_recv().unwrap().status, SyncStatus::Error);
    }
}
