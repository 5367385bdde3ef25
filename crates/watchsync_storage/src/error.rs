//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The write would exceed the store-wide quota.
    #[error("quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded {
        /// Bytes the store would hold after the write.
        needed: usize,
        /// Store-wide quota.
        quota: usize,
    },

    /// A single item exceeds the per-item size ceiling.
    #[error("item {key} is {size} bytes, limit is {limit}")]
    ItemTooLarge {
        /// Offending key.
        key: String,
        /// Serialized size of the item.
        size: usize,
        /// Per-item limit.
        limit: usize,
    },

    /// The storage capability is absent or refused service.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The store has been closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Returns true if retrying on a later cycle may succeed.
    ///
    /// Everything except [`StorageError::Unavailable`] is transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StorageError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StorageError::QuotaExceeded {
            needed: 10,
            quota: 5
        }
        .is_transient());
        assert!(StorageError::Io(io::Error::other("disk")).is_transient());
        assert!(!StorageError::Unavailable("no sync".into()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = StorageError::ItemTooLarge {
            key: "ns_video_a".into(),
            size: 9000,
            limit: 8192,
        };
        assert_eq!(err.to_string(), "item ns_video_a is 9000 bytes, limit is 8192");
    }
}
