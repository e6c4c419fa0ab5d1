//! Test fixtures and factory helpers.
//!
//! Provides an in-memory factory that drives its own scheduler, plus
//! storage backends that count or fail operations on demand.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use versadb_core::{Connection, Factory, FactoryConfig, Request};
use versadb_storage::{
    DatabaseOptions, InMemoryBackend, StorageBackend, StorageError, StorageResult, StoredDatabase,
};

/// A factory over an in-memory backend with scheduler helpers.
pub struct TestFactory {
    /// The factory instance.
    pub factory: Factory,
    backend: Arc<CountingBackend>,
}

impl TestFactory {
    /// Creates a test factory with default configuration.
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    /// Creates a test factory with a custom configuration.
    pub fn with_config(config: FactoryConfig) -> Self {
        let backend = Arc::new(CountingBackend::new());
        let shared: Arc<dyn StorageBackend> = Arc::clone(&backend) as Arc<dyn StorageBackend>;
        Self {
            factory: Factory::with_config(shared, config),
            backend,
        }
    }

    /// Returns the counting backend behind the factory.
    pub fn backend(&self) -> &CountingBackend {
        &self.backend
    }

    /// Runs queued tasks until the scheduler is idle.
    pub fn settle(&self) -> usize {
        self.factory.scheduler().run_until_idle()
    }

    /// Advances the virtual clock, firing due timers.
    pub fn advance(&self, ticks: u64) -> usize {
        self.factory.scheduler().advance(ticks)
    }

    /// Opens `name` at `version` without running the scheduler.
    pub fn open(&self, name: &str, version: u64) -> Arc<Request> {
        self.factory
            .open_version(name, version)
            .expect("Failed to create open request")
    }

    /// Opens `name` at `version`, settles, and returns the connection.
    ///
    /// # Panics
    ///
    /// Panics if the open request does not succeed.
    pub fn connect(&self, name: &str, version: u64) -> Arc<Connection> {
        let request = self.open(name, version);
        self.settle();
        if let Some(err) = request.error() {
            panic!("open of {name} at version {version} failed: {err}");
        }
        request.result().expect("Open request did not complete")
    }

    /// Returns the stored version of `name`, if it exists in the backend.
    pub fn stored_version(&self, name: &str) -> Option<u64> {
        self.backend
            .inner()
            .snapshot(&versadb_core::canonicalize(name))
            .map(|s| s.version)
    }
}

impl Default for TestFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFactory {
    type Target = Factory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

/// Runs a test with a fresh [`TestFactory`].
///
/// # Example
///
/// ```rust
/// use versadb_testkit::with_factory;
///
/// with_factory(|tf| {
///     let connection = tf.connect("db", 1);
///     assert_eq!(connection.version(), 1);
/// });
/// ```
pub fn with_factory<F, R>(f: F) -> R
where
    F: FnOnce(&TestFactory) -> R,
{
    let tf = TestFactory::new();
    f(&tf)
}

/// In-memory backend that counts calls.
#[derive(Debug, Default)]
pub struct CountingBackend {
    inner: InMemoryBackend,
    loads: AtomicUsize,
    commits: AtomicUsize,
    destroys: AtomicUsize,
}

impl CountingBackend {
    /// Creates an empty counting backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped in-memory backend.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Number of `load` calls.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `commit_upgrade` calls.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of `destroy` calls.
    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

impl StorageBackend for CountingBackend {
    fn load(&self, name: &str, options: &DatabaseOptions) -> StorageResult<StoredDatabase> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(name, options)
    }

    fn commit_upgrade(&self, name: &str, snapshot: &StoredDatabase) -> StorageResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_upgrade(name, snapshot)
    }

    fn destroy(&self, name: &str) -> StorageResult<()> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.inner.destroy(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }
}

/// Which backend operation to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// `load` fails.
    Load,
    /// `commit_upgrade` fails.
    Commit,
    /// `destroy` fails.
    Destroy,
}

/// In-memory backend that fails a chosen operation while armed.
#[derive(Debug)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    mode: FailureMode,
    armed: AtomicBool,
    error: Mutex<StorageError>,
}

impl FailingBackend {
    /// Creates a backend that fails `mode` with a `QuotaExceededError`.
    pub fn new(mode: FailureMode) -> Self {
        Self::with_error(
            mode,
            StorageError::rejected("QuotaExceededError", "injected failure"),
        )
    }

    /// Creates a backend that fails `mode` with `error`.
    pub fn with_error(mode: FailureMode, error: StorageError) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            mode,
            armed: AtomicBool::new(true),
            error: Mutex::new(error),
        }
    }

    /// Stops injecting failures.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Resumes injecting failures.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Returns the wrapped in-memory backend.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    fn check(&self, op: FailureMode) -> StorageResult<()> {
        if self.mode == op && self.armed.load(Ordering::SeqCst) {
            Err(self.error.lock().clone())
        } else {
            Ok(())
        }
    }
}

impl StorageBackend for FailingBackend {
    fn load(&self, name: &str, options: &DatabaseOptions) -> StorageResult<StoredDatabase> {
        self.check(FailureMode::Load)?;
        self.inner.load(name, options)
    }

    fn commit_upgrade(&self, name: &str, snapshot: &StoredDatabase) -> StorageResult<()> {
        self.check(FailureMode::Commit)?;
        self.inner.commit_upgrade(name, snapshot)
    }

    fn destroy(&self, name: &str) -> StorageResult<()> {
        self.check(FailureMode::Destroy)?;
        self.inner.destroy(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }
}
