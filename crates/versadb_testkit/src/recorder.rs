//! Event recorders for requests and connections.
//!
//! A recorder subscribes to every notification of its target and keeps an
//! ordered log, each entry stamped with the virtual time it arrived at.

use parking_lot::Mutex;
use std::sync::Arc;
use versadb_core::{Connection, Request, Scheduler, Ticks, VersionChange};

/// A notification observed on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// Advisory `blocked`.
    Blocked(VersionChange),
    /// `upgradeneeded` with `(old_version, new_version)`.
    UpgradeNeeded(u64, u64),
    /// Terminal success with `(old_version, new_version)`.
    Success(Option<u64>, Option<u64>),
    /// Terminal error, by DOM name.
    Error(String),
}

impl RequestEvent {
    /// Returns true for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestEvent::Success(..) | RequestEvent::Error(_))
    }
}

/// Records every notification a request delivers.
#[derive(Clone)]
pub struct RequestLog {
    events: Arc<Mutex<Vec<(Ticks, RequestEvent)>>>,
}

impl RequestLog {
    /// Subscribes to all of `request`'s notifications.
    pub fn attach(request: &Request, scheduler: &Scheduler) -> Self {
        let log = Self {
            events: Arc::new(Mutex::new(Vec::new())),
        };

        let (events, clock) = (Arc::clone(&log.events), scheduler.clone());
        request.on_blocked(move |change| {
            events
                .lock()
                .push((clock.now(), RequestEvent::Blocked(*change)));
        });

        let (events, clock) = (Arc::clone(&log.events), scheduler.clone());
        request.on_upgrade_needed(move |event| {
            events.lock().push((
                clock.now(),
                RequestEvent::UpgradeNeeded(event.old_version, event.new_version),
            ));
        });

        let (events, clock) = (Arc::clone(&log.events), scheduler.clone());
        request.on_success(move |event| {
            events.lock().push((
                clock.now(),
                RequestEvent::Success(event.old_version, event.new_version),
            ));
        });

        let (events, clock) = (Arc::clone(&log.events), scheduler.clone());
        request.on_error(move |err| {
            events
                .lock()
                .push((clock.now(), RequestEvent::Error(err.name().to_string())));
        });

        log
    }

    /// Returns the events without timestamps.
    pub fn events(&self) -> Vec<RequestEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Returns the events with their timestamps.
    pub fn timeline(&self) -> Vec<(Ticks, RequestEvent)> {
        self.events.lock().clone()
    }

    /// Returns the number of terminal events recorded.
    pub fn terminal_count(&self) -> usize {
        self.events.lock().iter().filter(|(_, e)| e.is_terminal()).count()
    }

    /// Returns the number of `blocked` events recorded.
    pub fn blocked_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| matches!(e, RequestEvent::Blocked(_)))
            .count()
    }

    /// Returns the terminal event, if one was recorded.
    pub fn outcome(&self) -> Option<RequestEvent> {
        self.events
            .lock()
            .iter()
            .map(|(_, e)| e)
            .find(|e| e.is_terminal())
            .cloned()
    }
}

/// Records the "versionchange" notifications of a connection.
#[derive(Clone)]
pub struct ConnectionLog {
    changes: Arc<Mutex<Vec<VersionChange>>>,
}

impl ConnectionLog {
    /// Subscribes to `connection`. With `close_on_change`, the connection
    /// closes itself on every notification.
    pub fn attach(connection: &Arc<Connection>, close_on_change: bool) -> Self {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&changes);
        let target = Arc::downgrade(connection);
        connection.on_version_change(move |change| {
            recorded.lock().push(*change);
            if close_on_change {
                if let Some(connection) = target.upgrade() {
                    connection.close();
                }
            }
        });
        Self { changes }
    }

    /// Returns the recorded notifications.
    pub fn changes(&self) -> Vec<VersionChange> {
        self.changes.lock().clone()
    }
}
