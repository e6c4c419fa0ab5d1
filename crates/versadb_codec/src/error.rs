//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while validating or comparing keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value is not a valid key.
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// Why the value was rejected.
        reason: String,
    },

    /// A JSON document could not be mapped onto a value.
    #[error("invalid JSON value: {message}")]
    InvalidJson {
        /// Description of the mapping error.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid key error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Returns the DOM-style exception name for this error.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidKey { .. } => "DataError",
            Self::InvalidJson { .. } => "SyntaxError",
        }
    }
}
