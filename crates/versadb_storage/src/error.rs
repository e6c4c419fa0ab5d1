//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend refused the operation.
    ///
    /// `name` is the DOM-style error name reported to the caller
    /// (for example `"QuotaExceededError"`).
    #[error("{name}: {message}")]
    Rejected {
        /// DOM-style error name.
        name: String,
        /// Human readable description.
        message: String,
    },

    /// No stored database has the given name.
    #[error("database not found: {0}")]
    NotFound(String),

    /// Stored data failed validation.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates a rejected error with an explicit DOM-style name.
    pub fn rejected(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the DOM-style error name.
    pub fn name(&self) -> &str {
        match self {
            Self::Rejected { name, .. } => name,
            Self::NotFound(_) => "NotFoundError",
            Self::Corrupted(_) => "DataError",
            Self::Closed => "InvalidStateError",
        }
    }
}
