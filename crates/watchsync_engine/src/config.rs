//! Configuration for the sync engine.

use std::time::Duration;
use watchsync_protocol::{MergePolicy, Namespace};
use watchsync_storage::RemoteLimits;

/// Configuration for sync scheduling and cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval of the periodic sync timer.
    pub sync_interval: Duration,
    /// Minimum spacing between listener-triggered syncs.
    pub listener_throttle: Duration,
    /// Remote notifications this soon after our own remote write are echoes.
    pub echo_window: Duration,
    /// A sync within this long of the last success runs incrementally.
    pub incremental_threshold: Duration,
    /// How far back the incremental path looks for modified items.
    pub recent_window: Duration,
    /// Items older than this are kept off the remote store.
    pub remote_retention: Duration,
    /// Conflict resolution and tombstone rules.
    pub merge: MergePolicy,
    /// Remote namespace and size limits.
    pub remote: RemoteLimits,
}

impl SyncConfig {
    /// Creates a configuration with the default timings and limits.
    pub fn new() -> Self {
        Self {
            sync_interval: Duration::from_secs(5 * 60),
            listener_throttle: Duration::from_secs(5 * 60),
            echo_window: Duration::from_secs(20),
            incremental_threshold: Duration::from_secs(2 * 60),
            recent_window: Duration::from_secs(15 * 60),
            remote_retention: Duration::from_secs(7 * 24 * 60 * 60),
            merge: MergePolicy::default(),
            remote: RemoteLimits::default(),
        }
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the listener throttle.
    pub fn with_listener_throttle(mut self, throttle: Duration) -> Self {
        self.listener_throttle = throttle;
        self
    }

    /// Sets the echo suppression window.
    pub fn with_echo_window(mut self, window: Duration) -> Self {
        self.echo_window = window;
        self
    }

    /// Sets the incremental sync threshold.
    pub fn with_incremental_threshold(mut self, threshold: Duration) -> Self {
        self.incremental_threshold = threshold;
        self
    }

    /// Sets the incremental look-back window.
    pub fn with_recent_window(mut self, window: Duration) -> Self {
        self.recent_window = window;
        self
    }

    /// Sets the remote retention window.
    pub fn with_remote_retention(mut self, retention: Duration) -> Self {
        self.remote_retention = retention;
        self
    }

    /// Sets the merge policy, keeping the configured namespace.
    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge.with_namespace(self.remote.namespace.clone());
        self
    }

    /// Sets the remote limits.
    pub fn with_remote(mut self, remote: RemoteLimits) -> Self {
        self.merge = self.merge.with_namespace(remote.namespace.clone());
        self.remote = remote;
        self
    }

    /// Sets the remote namespace for both the adapter and the merge.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.merge = self.merge.with_namespace(namespace.clone());
        self.remote = self.remote.with_namespace(namespace);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
