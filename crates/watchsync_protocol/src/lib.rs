//! # watchsync protocol
//!
//! Item model, merge engine and chunker for watchsync.
//!
//! This crate provides:
//! - The shared key space (`video_<id>`, `deleted_video_<id>`, ...) and the
//!   remote [`Namespace`]
//! - Parsed [`Snapshot`]s of records and tombstones
//! - The [`merge`] function: last-write-wins with tombstones, tombstone
//!   retention and a staleness fail-safe
//! - The [`chunk`] function for fitting write batches under a size limit
//! - [`WritePlan`] and [`RecentWindow`] helpers used by the sync cycles
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod error;
mod item;
mod key;
mod merge;
mod plan;
mod recent;

pub use chunk::{batch_size, chunk, chunk_entries, chunk_with_overhead, entry_size};
pub use error::{ProtocolError, ProtocolResult};
pub use item::{
    deletion_time, duration_ms, record_time, time_field, Entry, RawSnapshot, Record, Snapshot,
    Timestamp, Tombstone,
};
pub use key::{ItemId, ItemKey, ItemKind, Namespace, DEFAULT_NAMESPACE};
pub use merge::{
    age_days, merge, MergeOutcome, MergePolicy, MergeReport, DEFAULT_STALE_AFTER,
    DEFAULT_TOMBSTONE_RETENTION,
};
pub use plan::WritePlan;
pub use recent::RecentWindow;
