//! # watchsync testkit
//!
//! Test utilities for watchsync.
//!
//! This crate provides:
//! - Snapshot and store fixtures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use watchsync_testkit::prelude::*;
//!
//! let remote = shared_remote();
//! let local = snapshot(&[("video_a", record(100))]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
