//! Asynchronous requests returned by the factory.
//!
//! A [`Request`] is handed back synchronously; its pipeline runs on later
//! scheduler turns. Every request reaches exactly one terminal outcome,
//! `success` or `error`. Before that it may report `blocked` any number of
//! times and, on the open path, `upgradeneeded` at most once.

use crate::connection::Connection;
use crate::error::CoreError;
use crate::scheduler::{Scheduler, Ticks, TimerHandle};
use crate::signal::{Completion, ListenerId, Signal};
use crate::transaction::VersionChangeTransaction;
use crate::types::{RequestId, VersionChange};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which factory operation created the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `open`
    Open,
    /// `delete_database`
    Delete,
}

/// Whether the request has reached its terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Still running.
    Pending,
    /// Succeeded or failed.
    Done,
}

/// Payload of the terminal `success` notification.
#[derive(Debug, Clone)]
pub struct SuccessEvent {
    /// Version before the operation; `None` if the database did not exist.
    pub old_version: Option<u64>,
    /// Version after the operation; `None` after a deletion.
    pub new_version: Option<u64>,
    /// The connection, for open requests.
    pub result: Option<Arc<Connection>>,
}

/// Payload of the `upgradeneeded` notification.
#[derive(Debug, Clone)]
pub struct UpgradeNeeded {
    /// Version before the upgrade.
    pub old_version: u64,
    /// Version being upgraded to.
    pub new_version: u64,
    /// The upgrading connection.
    pub connection: Arc<Connection>,
    /// The running version-change transaction.
    pub transaction: Arc<VersionChangeTransaction>,
}

struct RequestState {
    ready_state: ReadyState,
    result: Option<Arc<Connection>>,
    error: Option<CoreError>,
    transaction: Option<Arc<VersionChangeTransaction>>,
    blocked_timer: Option<TimerHandle>,
}

/// A pending open or delete operation.
pub struct Request {
    id: RequestId,
    kind: RequestKind,
    name: String,
    scheduler: Scheduler,
    state: Mutex<RequestState>,
    success: Signal<SuccessEvent>,
    error: Signal<CoreError>,
    blocked: Signal<VersionChange>,
    upgrade_needed: Signal<UpgradeNeeded>,
}

impl Request {
    pub(crate) fn new(
        id: RequestId,
        kind: RequestKind,
        name: impl Into<String>,
        scheduler: Scheduler,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind,
            name: name.into(),
            scheduler,
            state: Mutex::new(RequestState {
                ready_state: ReadyState::Pending,
                result: None,
                error: None,
                transaction: None,
                blocked_timer: None,
            }),
            success: Signal::once("success"),
            error: Signal::once("error"),
            blocked: Signal::repeating("blocked"),
            upgrade_needed: Signal::once("upgradeneeded"),
        })
    }

    /// Returns the request ID.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the kind of operation.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Returns the database name as passed by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ready state.
    pub fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    /// Returns true once the request has succeeded or failed.
    pub fn is_done(&self) -> bool {
        self.ready_state() == ReadyState::Done
    }

    /// Returns the result slot.
    ///
    /// Set to the connection when `upgradeneeded` fires or when an open
    /// succeeds. Cleared on error.
    pub fn result(&self) -> Option<Arc<Connection>> {
        self.state.lock().result.clone()
    }

    /// Returns the error, once the request has failed.
    pub fn error(&self) -> Option<CoreError> {
        self.state.lock().error.clone()
    }

    /// Returns the version-change transaction of an upgrading open.
    pub fn transaction(&self) -> Option<Arc<VersionChangeTransaction>> {
        self.state.lock().transaction.clone()
    }

    /// Registers the terminal success listener.
    pub fn on_success<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(&SuccessEvent) + Send + 'static,
    {
        self.success.subscribe_once(listener)
    }

    /// Registers the terminal error listener.
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(&CoreError) + Send + 'static,
    {
        self.error.subscribe_once(listener)
    }

    /// Registers a listener for advisory `blocked` notifications.
    pub fn on_blocked<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&VersionChange) + Send + Sync + 'static,
    {
        self.blocked.subscribe(listener)
    }

    /// Removes a `blocked` listener.
    pub fn off_blocked(&self, id: ListenerId) -> bool {
        self.blocked.unsubscribe(id)
    }

    /// Registers the `upgradeneeded` listener.
    ///
    /// The transaction in the payload is running while the listener
    /// executes and commits on the following turn unless aborted.
    pub fn on_upgrade_needed<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(&UpgradeNeeded) + Send + 'static,
    {
        self.upgrade_needed.subscribe_once(listener)
    }

    /// Returns how many `blocked` notifications were delivered.
    pub fn blocked_count(&self) -> usize {
        self.blocked.emit_count()
    }

    pub(crate) fn set_result(&self, connection: Arc<Connection>) {
        self.state.lock().result = Some(connection);
    }

    /// Reports success. Returns false if the request had already finished.
    pub(crate) fn succeed(&self, old_version: Option<u64>, new_version: Option<u64>) -> bool {
        let result = {
            let mut state = self.state.lock();
            if state.ready_state == ReadyState::Done {
                return false;
            }
            state.ready_state = ReadyState::Done;
            state.result.clone()
        };
        self.disarm_blocked_timer();

        debug!(request = %self.id, name = %self.name, "request succeeded");
        self.success.emit(SuccessEvent {
            old_version,
            new_version,
            result,
        });
        true
    }

    /// Reports failure. Returns false if the request had already finished.
    pub(crate) fn fail(&self, err: CoreError) -> bool {
        {
            let mut state = self.state.lock();
            if state.ready_state == ReadyState::Done {
                return false;
            }
            state.ready_state = ReadyState::Done;
            state.result = None;
            state.error = Some(err.clone());
        }
        self.disarm_blocked_timer();

        debug!(request = %self.id, name = %self.name, error = %err, "request failed");
        self.error.emit(err);
        true
    }

    pub(crate) fn fire_upgrade_needed(&self, event: UpgradeNeeded) {
        {
            let mut state = self.state.lock();
            state.result = Some(Arc::clone(&event.connection));
            state.transaction = Some(Arc::clone(&event.transaction));
        }
        self.upgrade_needed.emit(event);
    }

    /// Schedules the advisory `blocked` notification.
    ///
    /// The notification is only delivered if `completion` is still pending
    /// when the timer fires.
    pub(crate) fn arm_blocked_timer(
        self: &Arc<Self>,
        delay: Ticks,
        change: VersionChange,
        completion: Completion,
    ) {
        let request = Arc::clone(self);
        let handle = self.scheduler.schedule_after(delay, move || {
            request.state.lock().blocked_timer = None;
            if completion.is_settled() || request.is_done() {
                return;
            }
            warn!(request = %request.id, name = %request.name, %change, "request blocked");
            request.blocked.emit(change);
        });
        self.state.lock().blocked_timer = Some(handle);
    }

    /// Cancels the `blocked` timer if it is still pending.
    pub(crate) fn disarm_blocked_timer(&self) {
        let handle = self.state.lock().blocked_timer.take();
        if let Some(handle) = handle {
            self.scheduler.cancel(handle);
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}
