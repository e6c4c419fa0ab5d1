//! Core type definitions for VersaDB.

use std::fmt;

/// Unique identifier for a connection.
///
/// Connection IDs are monotonically increasing per factory and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Creates a new connection ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Creates a new request ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Payload of "versionchange", "blocked" and "upgradeneeded" notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChange {
    /// Version before the change.
    pub old_version: u64,
    /// Version after the change; `None` when the database is being deleted.
    pub new_version: Option<u64>,
}

impl VersionChange {
    /// Creates a version change towards `new_version`.
    #[must_use]
    pub const fn upgrade(old_version: u64, new_version: u64) -> Self {
        Self {
            old_version,
            new_version: Some(new_version),
        }
    }

    /// Creates a version change for an impending deletion.
    #[must_use]
    pub const fn deletion(old_version: u64) -> Self {
        Self {
            old_version,
            new_version: None,
        }
    }
}

impl fmt::Display for VersionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.new_version {
            Some(v) => write!(f, "v{} -> v{}", self.old_version, v),
            None => write!(f, "v{} -> deleted", self.old_version),
        }
    }
}
