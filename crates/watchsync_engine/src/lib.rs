//! # watchsync engine
//!
//! Sync scheduler and status notifications for watchsync.
//!
//! This crate provides:
//! - Sync scheduler (disabled → initializing → syncing → success/error)
//! - Full and incremental sync cycles over the Local and Remote adapters
//! - Self-write echo suppression and listener throttling
//! - Single-item upload for low-latency propagation of a fresh save
//! - Status broadcasting to observers
//! - Persisted sync settings and a local record lifecycle helper
//!
//! ## Architecture
//!
//! A cycle reads both stores, runs the merge, then writes back:
//! 1. Local first (local priority if the process dies mid-cycle)
//! 2. Remote second, chunked to respect the per-item ceiling
//!
//! ## Key Invariants
//!
//! - At most one cycle in flight; triggers arriving meanwhile are dropped
//! - Errors never cross the public operations; they become status changes
//! - A failed cycle is retried on the next tick, with no backoff
//! - The probe failing is terminal until sync is re-enabled

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod cycle;
mod error;
mod history;
mod notify;
mod scheduler;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{ErrorClass, SyncError, SyncResult};
pub use history::{HistoryCounts, LocalHistory};
pub use notify::{NotificationHub, StatusCallback};
pub use scheduler::{RemoteChangeDecision, SyncScheduler};
pub use state::{
    StatusSnapshot, SyncKind, SyncReport, SyncSettings, SyncStats, SyncStatus, SETTINGS_KEY,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
