//! Database and connection registries.
//!
//! Both registries live in one [`Registry`] behind a single factory-owned
//! mutex. Every critical section is a short lookup or mutation; nothing is
//! ever called back while the lock is held.

use crate::connection::Connection;
use crate::error::{CoreError, CoreResult};
use crate::record::DatabaseRecord;
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps canonical names to database records.
#[derive(Default)]
pub(crate) struct DatabaseRegistry {
    records: HashMap<String, Arc<DatabaseRecord>>,
}

impl DatabaseRegistry {
    pub fn get(&self, name: &str) -> Option<Arc<DatabaseRecord>> {
        self.records.get(name).cloned()
    }

    pub fn insert(&mut self, record: Arc<DatabaseRecord>) {
        self.records.insert(record.name().to_string(), record);
    }

    /// Removes `record` only if it is still the registered entry for its name.
    pub fn remove_record(&mut self, record: &Arc<DatabaseRecord>) -> bool {
        if self.contains_record(record) {
            self.records.remove(record.name());
            true
        } else {
            false
        }
    }

    pub fn contains_record(&self, record: &Arc<DatabaseRecord>) -> bool {
        self.records
            .get(record.name())
            .is_some_and(|current| Arc::ptr_eq(current, record))
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<DatabaseRecord>> {
        self.records.values()
    }
}

/// All currently open connections, in connection order.
#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    connections: Vec<Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn push(&mut self, connection: Arc<Connection>) {
        self.connections.push(connection);
    }

    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id() != id);
        self.connections.len() != before
    }

    pub fn for_database(&self, name: &str) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|c| c.name() == name)
            .cloned()
            .collect()
    }

    pub fn count_for(&self, name: &str) -> usize {
        self.connections.iter().filter(|c| c.name() == name).count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

/// Process-wide state shared by every request pipeline of one factory.
#[derive(Default)]
pub(crate) struct Registry {
    pub databases: DatabaseRegistry,
    pub connections: ConnectionRegistry,
}

impl Registry {
    /// Adds a connection whose record is currently registered.
    pub fn register_connection(&mut self, connection: Arc<Connection>) -> CoreResult<()> {
        if !self.databases.contains_record(connection.record()) {
            return Err(CoreError::invalid_state(format!(
                "database {} is no longer registered",
                connection.name()
            )));
        }
        self.connections.push(connection);
        Ok(())
    }

    /// Returns the open connections of a database.
    pub fn open_connections(&self, name: &str) -> Vec<Arc<Connection>> {
        self.connections
            .for_database(name)
            .into_iter()
            .filter(|c| c.is_open())
            .collect()
    }
}
