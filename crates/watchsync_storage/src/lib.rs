//! # watchsync storage
//!
//! Key-value storage capability and store adapters for watchsync.
//!
//! Both the local store and the shared (remote) store are instances of the
//! same [`StorageArea`] capability. They differ only in configuration:
//!
//! - [`LocalStore`] passes keys through untouched
//! - [`RemoteStore`] prefixes every key with a [`Namespace`] and enforces a
//!   per-item size ceiling; the backing area enforces the quota
//!
//! ## Available Backings
//!
//! - [`InMemoryArea`] - For testing and ephemeral storage, with failure
//!   injection
//! - [`FileArea`] - A JSON document on disk
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use watchsync_storage::{ChangeScope, InMemoryArea, RemoteLimits, RemoteStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let area = Arc::new(InMemoryArea::new(ChangeScope::Sync));
//! let remote = RemoteStore::new(area, RemoteLimits::default());
//! assert!(remote.probe(1).await.unwrap());
//! # }
//! ```
//!
//! [`Namespace`]: watchsync_protocol::Namespace

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod area;
mod change;
mod error;
mod file;
mod local;
mod memory;
mod remote;

pub use area::StorageArea;
pub use change::{ChangeFeed, ChangeReceiver, ChangeScope, ChangeSet, StorageChange};
pub use error::{StorageError, StorageResult};
pub use file::FileArea;
pub use local::LocalStore;
pub use memory::{AreaLimits, InMemoryArea};
pub use remote::{RemoteChanges, RemoteLimits, RemoteStore, PROBE_KEY};
