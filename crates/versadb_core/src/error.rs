//! Error types for VersaDB core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in VersaDB core operations.
///
/// Every variant maps onto a DOM-style exception name via [`CoreError::name`],
/// which is what callers should switch on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] versadb_storage::StorageError),

    /// Argument of the wrong type or shape. Raised before a request exists.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument problem.
        message: String,
    },

    /// Requested version is below the stored version.
    #[error("requested version {requested} is less than the existing version {stored}")]
    Version {
        /// Version passed to `open`.
        requested: u64,
        /// Version currently stored.
        stored: u64,
    },

    /// Invalid key.
    #[error("data error: {message}")]
    Data {
        /// Description of the invalid data.
        message: String,
    },

    /// Operation was aborted.
    #[error("aborted: {reason}")]
    Abort {
        /// Reason for abort.
        reason: String,
    },

    /// The version-change transaction of an open request was aborted.
    #[error("upgrade of {name} from version {old_version} to {new_version} was aborted")]
    UpgradeAborted {
        /// Canonical database name.
        name: String,
        /// Version before the upgrade.
        old_version: u64,
        /// Version the upgrade was moving to.
        new_version: u64,
    },

    /// A uniqueness or schema constraint was violated.
    #[error("constraint violated: {message}")]
    Constraint {
        /// Description of the violation.
        message: String,
    },

    /// Operation not permitted in the object's current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Transaction has already committed or aborted.
    #[error("transaction is not active")]
    TransactionInactive,
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a version error.
    pub fn version(requested: u64, stored: u64) -> Self {
        Self::Version { requested, stored }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Creates an abort error.
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort {
            reason: reason.into(),
        }
    }

    /// Creates an upgrade aborted error.
    pub fn upgrade_aborted(name: impl Into<String>, old_version: u64, new_version: u64) -> Self {
        Self::UpgradeAborted {
            name: name.into(),
            old_version,
            new_version,
        }
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns the DOM-style exception name for this error.
    pub fn name(&self) -> &str {
        match self {
            Self::Storage(err) => err.name(),
            Self::InvalidArgument { .. } => "TypeError",
            Self::Version { .. } => "VersionError",
            Self::Data { .. } => "DataError",
            Self::Abort { .. } | Self::UpgradeAborted { .. } => "AbortError",
            Self::Constraint { .. } => "ConstraintError",
            Self::InvalidState { .. } => "InvalidStateError",
            Self::TransactionInactive => "TransactionInactiveError",
        }
    }
}

impl From<versadb_codec::CodecError> for CoreError {
    fn from(err: versadb_codec::CodecError) -> Self {
        match err {
            versadb_codec::CodecError::InvalidKey { reason } => Self::Data { message: reason },
            other => Self::invalid_argument(other.to_string()),
        }
    }
}
