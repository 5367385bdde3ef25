//! Error types for the sync engine.

use thiserror::Error;
use watchsync_protocol::ProtocolError;
use watchsync_storage::StorageError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// How an error affects the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote capability is absent. Terminal until re-enabled.
    Unavailable,
    /// A read or write failed mid-cycle. Retried on the next tick.
    TransientIo,
    /// A single item lacks a derivable id or shape. Skipped.
    Malformed,
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Store adapter failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Item could not be interpreted.
    #[error("malformed item: {0}")]
    Malformed(#[from] ProtocolError),

    /// Remote capability absent.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// Probe value read back differently from what was written.
    #[error("remote store probe read back a different value")]
    ProbeMismatch,

    /// Sync is not enabled.
    #[error("sync is disabled")]
    Disabled,

    /// Another cycle is in flight.
    #[error("a sync cycle is already in flight")]
    Busy,

    /// Nothing stored locally under the requested id.
    #[error("no local item for {0}")]
    NotFound(String),
}

impl SyncError {
    /// Classifies the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::Storage(e) if e.is_transient() => ErrorClass::TransientIo,
            SyncError::Storage(_) => ErrorClass::Unavailable,
            SyncError::Unavailable(_) | SyncError::ProbeMismatch | SyncError::Disabled => {
                ErrorClass::Unavailable
            }
            SyncError::Busy => ErrorClass::TransientIo,
            SyncError::Malformed(_) | SyncError::NotFound(_) => ErrorClass::Malformed,
        }
    }

    /// Returns true if the next scheduled tick should retry.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::TransientIo
    }
}
