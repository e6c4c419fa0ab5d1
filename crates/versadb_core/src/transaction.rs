//! Version-change transactions.
//!
//! A version-change transaction is the exclusive transaction under which a
//! schema upgrade runs. At most one is active per database record.
//!
//! ```text
//! Started --start()--> Running --commit()--> Complete
//!    |                    |
//!    +------abort()-------+--------------> Aborted
//! ```
//!
//! Once running, the transaction commits itself on the turn after the one
//! that started it, unless it was aborted in between.

use crate::error::{CoreError, CoreResult};
use crate::scheduler::Scheduler;
use crate::signal::{ListenerId, Signal};
use crate::types::VersionChange;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// State of a version-change transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created, waiting for its first turn.
    Started,
    /// Running; schema operations are permitted.
    Running,
    /// Committed.
    Complete,
    /// Aborted.
    Aborted,
}

impl TransactionState {
    /// Returns true if the transaction has neither committed nor aborted.
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Started | TransactionState::Running)
    }

    /// Returns true if the transaction has committed or aborted.
    pub fn is_finished(&self) -> bool {
        !self.is_active()
    }
}

/// An exclusive transaction that applies a schema upgrade.
pub struct VersionChangeTransaction {
    database: String,
    change: VersionChange,
    state: Mutex<TransactionState>,
    scheduler: Scheduler,
    started: Signal<()>,
    completed: Signal<()>,
    aborted: Signal<CoreError>,
    done: Signal<TransactionState>,
}

impl VersionChangeTransaction {
    pub(crate) fn new(
        database: impl Into<String>,
        old_version: u64,
        new_version: u64,
        scheduler: Scheduler,
    ) -> Arc<Self> {
        Arc::new(Self {
            database: database.into(),
            change: VersionChange::upgrade(old_version, new_version),
            state: Mutex::new(TransactionState::Started),
            scheduler,
            started: Signal::once("start"),
            completed: Signal::once("complete"),
            aborted: Signal::once("abort"),
            done: Signal::once("done"),
        })
    }

    /// Returns the canonical name of the database being upgraded.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the version before the upgrade.
    pub fn old_version(&self) -> u64 {
        self.change.old_version
    }

    /// Returns the version the upgrade moves to.
    pub fn new_version(&self) -> u64 {
        self.change.new_version.unwrap_or(self.change.old_version)
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    /// Returns true while the transaction is started or running.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Returns true while schema operations are permitted.
    pub fn is_running(&self) -> bool {
        self.state() == TransactionState::Running
    }

    /// Moves the transaction to `Running` and schedules its auto-commit.
    pub(crate) fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if *state != TransactionState::Started {
                return;
            }
            *state = TransactionState::Running;
        }

        debug!(database = %self.database, change = %self.change, "version change started");
        self.started.emit(());

        let txn = Arc::clone(self);
        self.scheduler.spawn(move || {
            if txn.is_running() {
                // Only fails if it stopped running, which we just checked
                let _ = txn.commit();
            }
        });
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the transaction has not started running,
    /// or `TransactionInactive` if it already finished.
    pub fn commit(&self) -> CoreResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                TransactionState::Running => *state = TransactionState::Complete,
                TransactionState::Started => {
                    return Err(CoreError::invalid_state(
                        "version change transaction has not started",
                    ))
                }
                _ => return Err(CoreError::TransactionInactive),
            }
        }

        debug!(database = %self.database, change = %self.change, "version change complete");
        self.completed.emit(());
        self.done.emit(TransactionState::Complete);
        Ok(())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionInactive` if the transaction already finished.
    pub fn abort(&self) -> CoreResult<()> {
        self.abort_with(CoreError::abort("version change transaction aborted"))
    }

    pub(crate) fn abort_with(&self, reason: CoreError) -> CoreResult<()> {
        {
            let mut state = self.state.lock();
            if state.is_finished() {
                return Err(CoreError::TransactionInactive);
            }
            *state = TransactionState::Aborted;
        }

        debug!(database = %self.database, change = %self.change, %reason, "version change aborted");
        self.aborted.emit(reason);
        self.done.emit(TransactionState::Aborted);
        Ok(())
    }

    /// Registers a listener for the transaction starting to run.
    pub fn on_start<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.started.subscribe_once(move |_| listener())
    }

    /// Registers a listener for a successful commit.
    pub fn on_complete<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.completed.subscribe_once(move |_| listener())
    }

    /// Registers a listener for an abort.
    pub fn on_abort<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(&CoreError) + Send + 'static,
    {
        self.aborted.subscribe_once(listener)
    }

    /// Registers a listener that runs after either commit or abort.
    pub fn on_done<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(TransactionState) + Send + 'static,
    {
        self.done.subscribe_once(move |state| listener(*state))
    }
}

impl std::fmt::Debug for VersionChangeTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionChangeTransaction")
            .field("database", &self.database)
            .field("change", &self.change)
            .field("state", &self.state())
            .finish()
    }
}
