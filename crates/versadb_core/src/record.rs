//! Database records.
//!
//! A [`DatabaseRecord`] is the registry entry for one canonical database
//! name. It mirrors the stored version and schema, and carries the two
//! lifecycle flags the request pipelines coordinate on:
//!
//! - `ready` is false while the record is being loaded or upgraded.
//! - `delete_pending` is true while a deletion is waiting for connections
//!   to close.

use crate::error::{CoreError, CoreResult};
use crate::signal::{ListenerId, Signal};
use crate::transaction::VersionChangeTransaction;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};
use versadb_storage::{DatabaseOptions, StorageBackend};

struct RecordState {
    version: u64,
    store_names: Vec<String>,
    loaded: bool,
    ready: bool,
    delete_pending: bool,
    upgrade: Option<Arc<VersionChangeTransaction>>,
}

/// Registry entry for one database.
pub struct DatabaseRecord {
    name: String,
    state: Mutex<RecordState>,
    load_succeeded: Signal<()>,
    load_failed: Signal<CoreError>,
    ready: Signal<()>,
    deleted: Signal<()>,
}

impl DatabaseRecord {
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(RecordState {
                version: 0,
                store_names: Vec::new(),
                loaded: false,
                ready: false,
                delete_pending: false,
                upgrade: None,
            }),
            load_succeeded: Signal::once("load-succeeded"),
            load_failed: Signal::once("load-failed"),
            ready: Signal::repeating("ready"),
            deleted: Signal::once("delete"),
        })
    }

    /// Returns the canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current version. Zero until loaded.
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Returns the object store names of the stored schema.
    pub fn store_names(&self) -> Vec<String> {
        self.state.lock().store_names.clone()
    }

    /// Returns true once the backend load has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Returns true when no load or upgrade is in progress.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Returns true while a deletion is pending.
    pub fn is_delete_pending(&self) -> bool {
        self.state.lock().delete_pending
    }

    /// Returns true once the record has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted.has_fired()
    }

    /// Returns the active version-change transaction, if any.
    pub fn version_change_transaction(&self) -> Option<Arc<VersionChangeTransaction>> {
        self.state
            .lock()
            .upgrade
            .as_ref()
            .filter(|txn| txn.is_active())
            .cloned()
    }

    /// Loads or creates the stored database and emits the load outcome.
    pub(crate) fn load(&self, backend: &dyn StorageBackend, options: &DatabaseOptions) {
        match backend.load(&self.name, options) {
            Ok(stored) => {
                {
                    let mut state = self.state.lock();
                    state.version = stored.version;
                    state.store_names = stored.store_names;
                    state.loaded = true;
                    state.ready = true;
                }
                debug!(database = %self.name, version = self.version(), "record loaded");
                // The creator must start its upgrade before waiters on `ready` retry
                self.load_succeeded.emit(());
                self.ready.emit(());
            }
            Err(err) => {
                warn!(database = %self.name, error = %err, "record load failed");
                self.load_failed.emit(err.into());
            }
        }
    }

    pub(crate) fn set_version(&self, version: u64) {
        self.state.lock().version = version;
    }

    pub(crate) fn set_store_names(&self, store_names: Vec<String>) {
        self.state.lock().store_names = store_names;
    }

    /// Marks the record busy ahead of an upgrade.
    pub(crate) fn begin_upgrade(&self) {
        self.state.lock().ready = false;
    }

    /// Attaches the upgrade transaction.
    ///
    /// Fails if another version-change transaction is still active.
    pub(crate) fn mark_version_change_started(
        &self,
        txn: Arc<VersionChangeTransaction>,
    ) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.upgrade.as_ref().is_some_and(|t| t.is_active()) {
            return Err(CoreError::invalid_state(format!(
                "database {} already has an active version change",
                self.name
            )));
        }
        state.ready = false;
        state.upgrade = Some(txn);
        Ok(())
    }

    /// Marks the record ready and wakes waiting requests.
    pub(crate) fn signal_ready(&self) {
        {
            let mut state = self.state.lock();
            state.ready = true;
            state.upgrade = None;
        }
        debug!(database = %self.name, "record ready");
        self.ready.emit(());
    }

    pub(crate) fn mark_delete_pending(&self) {
        self.state.lock().delete_pending = true;
    }

    pub(crate) fn clear_delete_pending(&self) {
        self.state.lock().delete_pending = false;
    }

    /// Announces that the record has been removed from the registry.
    pub(crate) fn signal_deleted(&self) {
        self.deleted.emit(());
    }

    pub(crate) fn on_load<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(&CoreError) + Send + 'static,
    {
        self.load_succeeded.subscribe_once(move |_| on_success());
        self.load_failed.subscribe_once(on_failure);
    }

    pub(crate) fn on_ready<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.ready.subscribe_once(move |_| listener())
    }

    pub(crate) fn off_ready(&self, id: ListenerId) -> bool {
        self.ready.unsubscribe(id)
    }

    pub(crate) fn on_deleted<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.deleted.subscribe_once(move |_| listener())
    }

    pub(crate) fn off_deleted(&self, id: ListenerId) -> bool {
        self.deleted.unsubscribe(id)
    }
}

impl std::fmt::Debug for DatabaseRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DatabaseRecord")
            .field("name", &self.name)
            .field("version", &state.version)
            .field("ready", &state.ready)
            .field("delete_pending", &state.delete_pending)
            .finish()
    }
}
