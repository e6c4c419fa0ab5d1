//! Database connections.
//!
//! A [`Connection`] is a live handle bound to one [`DatabaseRecord`]. It
//! snapshots the record's version and store names when it connects and
//! only changes them under its own version-change transaction.

use crate::error::{CoreError, CoreResult};
use crate::record::DatabaseRecord;
use crate::scheduler::Scheduler;
use crate::signal::{ListenerId, Signal};
use crate::transaction::VersionChangeTransaction;
use crate::types::{ConnectionId, VersionChange};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

struct ConnectionState {
    version: u64,
    store_names: Vec<String>,
    open: bool,
    upgrade: Option<Arc<VersionChangeTransaction>>,
}

/// A live handle to a database.
pub struct Connection {
    id: ConnectionId,
    record: Arc<DatabaseRecord>,
    state: Mutex<ConnectionState>,
    closed: Signal<ConnectionId>,
    version_change: Signal<VersionChange>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, record: Arc<DatabaseRecord>) -> Arc<Self> {
        let state = ConnectionState {
            version: record.version(),
            store_names: record.store_names(),
            open: true,
            upgrade: None,
        };
        Arc::new(Self {
            id,
            record,
            state: Mutex::new(state),
            closed: Signal::once("close"),
            version_change: Signal::repeating("versionchange"),
        })
    }

    /// Returns the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the canonical database name.
    pub fn name(&self) -> &str {
        self.record.name()
    }

    /// Returns the schema version seen by this connection.
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Returns the object store names, sorted.
    pub fn object_store_names(&self) -> Vec<String> {
        self.state.lock().store_names.clone()
    }

    /// Returns true until [`close`](Self::close) is called.
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Returns the running version-change transaction, if any.
    pub fn version_change_transaction(&self) -> Option<Arc<VersionChangeTransaction>> {
        self.state
            .lock()
            .upgrade
            .as_ref()
            .filter(|txn| txn.is_active())
            .cloned()
    }

    pub(crate) fn record(&self) -> &Arc<DatabaseRecord> {
        &self.record
    }

    /// Closes the connection.
    ///
    /// An active version-change transaction is aborted first. Closing
    /// twice has no effect.
    pub fn close(&self) {
        let upgrade = {
            let mut state = self.state.lock();
            if !state.open {
                return;
            }
            state.open = false;
            state.upgrade.take()
        };

        if let Some(txn) = upgrade.filter(|txn| txn.is_active()) {
            // Cannot fail: the transaction is active
            let _ = txn.abort_with(CoreError::abort("connection closed during upgrade"));
        }

        debug!(connection = %self.id, database = %self.name(), "connection closed");
        self.closed.emit(self.id);
    }

    /// Creates an object store during an upgrade.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside a running version-change transaction,
    /// `Constraint` if the store already exists.
    pub fn create_object_store(&self, name: &str) -> CoreResult<()> {
        let mut state = self.state.lock();
        Self::require_upgrade(&state)?;
        match state.store_names.binary_search_by(|s| s.as_str().cmp(name)) {
            Ok(_) => Err(CoreError::constraint(format!(
                "object store {name} already exists"
            ))),
            Err(at) => {
                state.store_names.insert(at, name.to_string());
                Ok(())
            }
        }
    }

    /// Deletes an object store during an upgrade.
    ///
    /// # Errors
    ///
    /// `InvalidState` outside a running version-change transaction or if
    /// no such store exists.
    pub fn delete_object_store(&self, name: &str) -> CoreResult<()> {
        let mut state = self.state.lock();
        Self::require_upgrade(&state)?;
        match state.store_names.binary_search_by(|s| s.as_str().cmp(name)) {
            Ok(at) => {
                state.store_names.remove(at);
                Ok(())
            }
            Err(_) => Err(CoreError::invalid_state(format!(
                "object store {name} does not exist"
            ))),
        }
    }

    fn require_upgrade(state: &ConnectionState) -> CoreResult<()> {
        if !state.open {
            return Err(CoreError::invalid_state("connection is closed"));
        }
        match &state.upgrade {
            Some(txn) if txn.is_running() => Ok(()),
            Some(_) => Err(CoreError::TransactionInactive),
            None => Err(CoreError::invalid_state(
                "schema changes require a version change transaction",
            )),
        }
    }

    /// Registers a listener for "versionchange" notifications.
    pub fn on_version_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&VersionChange) + Send + Sync + 'static,
    {
        self.version_change.subscribe(listener)
    }

    /// Removes a "versionchange" listener.
    pub fn off_version_change(&self, id: ListenerId) -> bool {
        self.version_change.unsubscribe(id)
    }

    /// Registers a listener for the connection closing.
    pub fn on_close<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(ConnectionId) + Send + 'static,
    {
        self.closed.subscribe_once(move |id| listener(*id))
    }

    /// Starts this connection's version-change transaction.
    pub(crate) fn begin_version_change(
        &self,
        new_version: u64,
        scheduler: Scheduler,
    ) -> Arc<VersionChangeTransaction> {
        let mut state = self.state.lock();
        let txn =
            VersionChangeTransaction::new(self.name(), state.version, new_version, scheduler);
        state.upgrade = Some(Arc::clone(&txn));
        txn
    }

    pub(crate) fn set_version(&self, version: u64) {
        self.state.lock().version = version;
    }

    pub(crate) fn finish_version_change(&self) {
        self.state.lock().upgrade = None;
    }

    /// Resets to version 0 with no object stores.
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock();
        state.version = 0;
        state.store_names.clear();
        state.upgrade = None;
    }

    /// Delivers "versionchange" if the connection is still open.
    ///
    /// Returns false if the connection had already closed.
    pub(crate) fn dispatch_version_change(&self, new_version: Option<u64>) -> bool {
        let change = {
            let state = self.state.lock();
            if !state.open {
                return false;
            }
            VersionChange {
                old_version: state.version,
                new_version,
            }
        };
        debug!(connection = %self.id, %change, "versionchange");
        self.version_change.emit(change);
        true
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.record.name())
            .field("version", &state.version)
            .field("open", &state.open)
            .finish()
    }
}
