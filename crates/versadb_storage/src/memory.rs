//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::schema::{DatabaseOptions, StoredDatabase};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory storage backend.
///
/// This backend keeps every database in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use versadb_storage::{DatabaseOptions, InMemoryBackend, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// let stored = backend.load("notes", &DatabaseOptions::new()).unwrap();
/// assert_eq!(stored.version, 0);
/// assert!(backend.exists("notes"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    databases: RwLock<HashMap<String, StoredDatabase>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored snapshot for `name`.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<StoredDatabase> {
        self.databases.read().get(name).cloned()
    }

    /// Returns the names of all stored databases, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes every stored database.
    pub fn clear(&self) {
        self.databases.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self, name: &str, options: &DatabaseOptions) -> StorageResult<StoredDatabase> {
        let mut databases = self.databases.write();
        let stored = databases
            .entry(name.to_string())
            .or_insert_with(|| StoredDatabase {
                version: 0,
                store_names: options.store_names(),
            });
        Ok(stored.clone())
    }

    fn commit_upgrade(&self, name: &str, snapshot: &StoredDatabase) -> StorageResult<()> {
        let mut databases = self.databases.write();
        let stored = databases
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        if snapshot.version <= stored.version {
            return Err(StorageError::Corrupted(format!(
                "upgrade of {} to version {} does not exceed stored version {}",
                name, snapshot.version, stored.version
            )));
        }

        *stored = snapshot.clone();
        Ok(())
    }

    fn destroy(&self, name: &str) -> StorageResult<()> {
        self.databases.write().remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.databases.read().contains_key(name)
    }
}
