//! Error types for the alert store.

use thiserror::Error;

/// Errors that can occur in the alert store.
///
/// Only [`StoreError::BackendUnavailable`] is surfaced by [`crate::AlertStore`]
/// operations. Validation and decode failures are recovered locally by
/// skipping the affected payload or record.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A raw payload could not be normalized into a record.
    #[error("invalid alert payload: {reason}")]
    Validation {
        /// Why the payload was rejected.
        reason: String,
    },

    /// Stored record bytes could not be decoded.
    #[error("corrupt record: {reason}")]
    Decode {
        /// The decoder's complaint.
        reason: String,
    },

    /// The key/value substrate could not be reached or rejected a command.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable {
        /// The underlying failure.
        reason: String,
    },

    /// The store configuration is unusable.
    #[error("invalid store configuration: {reason}")]
    InvalidConfig {
        /// The offending setting.
        reason: String,
    },
}

impl StoreError {
    /// Creates a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a backend-unavailable error.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
        }
    }

    /// Returns true if the error means the substrate is unreachable.
    #[must_use]
    pub const fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::BackendUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
