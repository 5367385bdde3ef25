//! Error types for the item model.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while interpreting stored items.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An item key or value does not have the required shape.
    #[error("malformed item {key}: {reason}")]
    Malformed {
        /// The offending key, as found in the store.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A key does not belong to any item kind.
    #[error("not an item key: {0}")]
    NotAnItem(String),

    /// A value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProtocolError {
    /// Creates a malformed-item error.
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error only affects a single item.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProtocolError::Malformed { .. })
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let err = ProtocolError::malformed("video_", "empty id");
        assert_eq!(err.to_string(), "malformed item video_: empty id");
        assert!(err.is_malformed());
        assert!(!ProtocolError::NotAnItem("sync_settings".into()).is_malformed());
    }
}
