//! Store definitions and stored database snapshots.

use std::collections::BTreeMap;

/// Definition of a single object store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreDefinition {
    /// Key path used to extract keys from stored objects.
    pub key_path: Option<String>,
    /// Whether the store generates keys.
    pub auto_increment: bool,
}

impl StoreDefinition {
    /// Creates a definition with out-of-line keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key path.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Sets whether keys are generated.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }
}

/// Options passed when a database is first created.
///
/// The engine treats this as opaque apart from the store names; the
/// backend decides what to do with the definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    stores: BTreeMap<String, StoreDefinition>,
}

impl DatabaseOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a store definition.
    #[must_use]
    pub fn store(mut self, name: impl Into<String>, definition: StoreDefinition) -> Self {
        self.stores.insert(name.into(), definition);
        self
    }

    /// Returns the defined store names in sorted order.
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Returns the definition for a store.
    pub fn definition(&self, name: &str) -> Option<&StoreDefinition> {
        self.stores.get(name)
    }

    /// Returns true if no stores are defined.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Snapshot of a stored database as seen by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredDatabase {
    /// Committed schema version (0 for a freshly created database).
    pub version: u64,
    /// Names of the object stores, sorted.
    pub store_names: Vec<String>,
}
