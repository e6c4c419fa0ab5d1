//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::schema::{DatabaseOptions, StoredDatabase};

/// A storage backend for VersaDB databases.
///
/// Backends own record and object storage. The engine only needs them to
/// construct-or-load a database by canonical name, persist the outcome of a
/// committed upgrade, and destroy a database's contents.
///
/// # Invariants
///
/// - `load` of an unknown name creates the database at version 0
/// - `load` of a known name returns the last committed snapshot
/// - `commit_upgrade` is only called with a version above the stored one
/// - `destroy` of an unknown name succeeds
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and ephemeral databases
pub trait StorageBackend: Send + Sync {
    /// Loads the database called `name`, creating it if it does not exist.
    ///
    /// `options` is only consulted when the database is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or read.
    fn load(&self, name: &str, options: &DatabaseOptions) -> StorageResult<StoredDatabase>;

    /// Persists the result of a completed upgrade.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist or cannot be written.
    fn commit_upgrade(&self, name: &str, snapshot: &StoredDatabase) -> StorageResult<()>;

    /// Destroys the database called `name` and all of its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the contents cannot be removed.
    fn destroy(&self, name: &str) -> StorageResult<()>;

    /// Returns true if a database called `name` exists.
    fn exists(&self, name: &str) -> bool;
}
