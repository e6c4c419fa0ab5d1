//! The factory: entry point for opening and deleting databases.

use crate::args::OpenArgs;
use crate::config::FactoryConfig;
use crate::connection::Connection;
use crate::delete::DeleteOperation;
use crate::error::{CoreError, CoreResult};
use crate::name::canonicalize;
use crate::open::OpenOperation;
use crate::record::DatabaseRecord;
use crate::registry::Registry;
use crate::request::{Request, RequestKind};
use crate::scheduler::Scheduler;
use crate::types::{ConnectionId, RequestId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use versadb_codec::Value;
use versadb_storage::{InMemoryBackend, StorageBackend};

pub(crate) struct FactoryInner {
    pub config: FactoryConfig,
    pub scheduler: Scheduler,
    pub backend: Arc<dyn StorageBackend>,
    pub registry: Mutex<Registry>,
    next_connection_id: AtomicU64,
    next_request_id: AtomicU64,
}

impl FactoryInner {
    pub fn new(
        config: FactoryConfig,
        scheduler: Scheduler,
        backend: Arc<dyn StorageBackend>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            scheduler,
            backend,
            registry: Mutex::new(Registry::default()),
            next_connection_id: AtomicU64::new(0),
            next_request_id: AtomicU64::new(0),
        })
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::new(self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Registers a connection and unregisters it when it closes.
    pub fn track_connection(self: &Arc<Self>, connection: &Arc<Connection>) -> CoreResult<()> {
        self.registry
            .lock()
            .register_connection(Arc::clone(connection))?;

        let factory: Weak<Self> = Arc::downgrade(self);
        connection.on_close(move |id| {
            if let Some(factory) = factory.upgrade() {
                factory.registry.lock().connections.remove(id);
            }
        });
        Ok(())
    }
}

/// Opens, upgrades, and deletes databases.
///
/// A factory owns its registries and scheduler; independent factories
/// share nothing. Cloning yields another handle to the same factory.
///
/// ```
/// use versadb_core::Factory;
///
/// let factory = Factory::in_memory();
/// let request = factory.open("library");
/// factory.scheduler().run_until_idle();
/// assert!(request.result().is_some());
/// ```
#[derive(Clone)]
pub struct Factory {
    inner: Arc<FactoryInner>,
}

impl Factory {
    /// Creates a factory over `backend` with default configuration.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, FactoryConfig::default())
    }

    /// Creates a factory over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Creates a factory with a custom configuration.
    pub fn with_config(backend: Arc<dyn StorageBackend>, config: FactoryConfig) -> Self {
        Self::with_scheduler(backend, config, Scheduler::new())
    }

    /// Creates a factory that runs on an existing scheduler.
    pub fn with_scheduler(
        backend: Arc<dyn StorageBackend>,
        config: FactoryConfig,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            inner: FactoryInner::new(config, scheduler, backend),
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> Arc<FactoryInner> {
        Arc::clone(&self.inner)
    }

    /// Returns the scheduler driving this factory's requests.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FactoryConfig {
        &self.inner.config
    }

    /// Returns the storage backend.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.inner.backend
    }

    /// Opens `name` at the default version.
    pub fn open(&self, name: &str) -> Arc<Request> {
        self.start_open(OpenArgs::new(name))
    }

    /// Opens `name` at `version`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `version` is 0.
    pub fn open_version(&self, name: &str, version: u64) -> CoreResult<Arc<Request>> {
        self.open_with(OpenArgs::new(name).version(version))
    }

    /// Opens a database with explicit arguments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the requested version is 0. No request
    /// is created in that case.
    pub fn open_with(&self, args: OpenArgs) -> CoreResult<Arc<Request>> {
        args.validate()?;
        Ok(self.start_open(args))
    }

    /// Opens a database from dynamically typed arguments.
    ///
    /// See [`OpenArgs::from_values`] for how the arguments are interpreted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a type or shape mismatch.
    pub fn open_values(
        &self,
        name: &Value,
        second: Option<&Value>,
        third: Option<&Value>,
    ) -> CoreResult<Arc<Request>> {
        self.open_with(OpenArgs::from_values(name, second, third)?)
    }

    fn start_open(&self, args: OpenArgs) -> Arc<Request> {
        let request = Request::new(
            self.inner.next_request_id(),
            RequestKind::Open,
            args.name(),
            self.inner.scheduler.clone(),
        );
        let version = args
            .requested_version()
            .unwrap_or(self.inner.config.default_version);
        debug!(request = %request.id(), name = args.name(), version, "open requested");

        OpenOperation::new(
            Arc::clone(&self.inner),
            Arc::clone(&request),
            canonicalize(args.name()),
            version,
            args.database_options().clone(),
        )
        .start();
        request
    }

    /// Deletes `name`.
    pub fn delete_database(&self, name: &str) -> Arc<Request> {
        let request = Request::new(
            self.inner.next_request_id(),
            RequestKind::Delete,
            name,
            self.inner.scheduler.clone(),
        );
        debug!(request = %request.id(), name, "delete requested");

        DeleteOperation::new(
            Arc::clone(&self.inner),
            Arc::clone(&request),
            canonicalize(name),
        )
        .start();
        request
    }

    /// Deletes a database named by a dynamically typed value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` is not text.
    pub fn delete_database_value(&self, name: &Value) -> CoreResult<Arc<Request>> {
        let name = name
            .as_text()
            .ok_or_else(|| CoreError::invalid_argument("database name must be a string"))?;
        Ok(self.delete_database(name))
    }

    /// Compares two keys, returning -1, 0, or 1.
    ///
    /// # Errors
    ///
    /// Returns `Data` (DataError) if either value is not a valid key.
    pub fn cmp(&self, first: &Value, second: &Value) -> CoreResult<i8> {
        Ok(versadb_codec::cmp(first, second)?)
    }

    /// Lists registered databases as `(canonical name, version)`, sorted by name.
    pub fn databases(&self) -> Vec<(String, u64)> {
        let mut databases: Vec<_> = self
            .inner
            .registry
            .lock()
            .databases
            .records()
            .map(|record| (record.name().to_string(), record.version()))
            .collect();
        databases.sort();
        databases
    }

    /// Returns the registry record for `name`, if one exists.
    pub fn record(&self, name: &str) -> Option<Arc<DatabaseRecord>> {
        self.inner.registry.lock().databases.get(&canonicalize(name))
    }

    /// Counts the open connections to `name`.
    pub fn connections(&self, name: &str) -> usize {
        self.inner
            .registry
            .lock()
            .open_connections(&canonicalize(name))
            .len()
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("config", &self.inner.config)
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmp_keys() {
        let factory = Factory::in_memory();
        assert_eq!(factory.cmp(&Value::from(1), &Value::from(2)).unwrap(), -1);
        assert_eq!(factory.cmp(&Value::from("a"), &Value::from("a")).unwrap(), 0);
        assert_eq!(factory.cmp(&Value::from("b"), &Value::from(9)).unwrap(), 1);
        let err = factory
            .cmp(&Value::empty_object(), &Value::empty_object())
            .unwrap_err();
        assert_eq!(err.name(), "DataError");
    }

    #[test]
    fn version_zero_rejected_synchronously() {
        let factory = Factory::in_memory();
        let err = factory.open_version("db", 0).unwrap_err();
        assert_eq!(err.name(), "TypeError");
        assert!(factory.scheduler().is_idle());
    }

    #[test]
    fn delete_requires_text_name() {
        let factory = Factory::in_memory();
        let err = factory.delete_database_value(&Value::Null).unwrap_err();
        assert_eq!(err.name(), "TypeError");
    }

    #[test]
    fn open_runs_on_later_turn() {
        let factory = Factory::in_memory();
        let request = factory.open("db");
        assert!(!request.is_done());
        assert!(factory.databases().is_empty());

        factory.scheduler().run_until_idle();
        assert!(request.is_done());
        assert_eq!(factory.databases(), vec![("db".to_string(), 1)]);
        assert_eq!(factory.connections("db"), 1);
    }

    #[test]
    fn names_are_canonicalized() {
        let factory = Factory::in_memory();
        factory.open("my.db");
        factory.scheduler().run_until_idle();
        assert_eq!(factory.databases(), vec![("my%2Edb".to_string(), 1)]);
        assert_eq!(factory.connections("my.db"), 1);
    }

    #[test]
    fn closed_connections_leave_registry() {
        let factory = Factory::in_memory();
        let request = factory.open("db");
        factory.scheduler().run_until_idle();
        let connection = request.result().unwrap();
        connection.close();
        assert_eq!(factory.connections("db"), 0);
        assert_eq!(factory.inner.registry.lock().connections.len(), 0);
    }

    #[test]
    fn ids_are_unique() {
        let factory = Factory::in_memory();
        let a = factory.open("a");
        let b = factory.delete_database("a");
        assert_ne!(a.id(), b.id());
    }
}
