//! Version-change broadcast.
//!
//! Before an upgrade or a deletion can take exclusive access to a database,
//! every open connection to it is sent "versionchange" and the caller waits
//! for all of them to close. The coordinator never times out and never
//! rejects; blocked detection is layered on by the request pipelines.

use crate::connection::Connection;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::signal::Completion;
use crate::types::ConnectionId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Sends "versionchange" to the open connections of `name`.
///
/// The returned completion resolves once every notified connection has
/// closed, or immediately if none was open. Notifications are delivered on
/// later turns, never from inside this call.
pub(crate) fn fire_version_change(
    registry: &Mutex<Registry>,
    scheduler: &Scheduler,
    name: &str,
    new_version: Option<u64>,
) -> Completion {
    let connections = registry.lock().open_connections(name);
    broadcast(scheduler, connections, new_version)
}

fn broadcast(
    scheduler: &Scheduler,
    connections: Vec<Arc<Connection>>,
    new_version: Option<u64>,
) -> Completion {
    let completion = Completion::new();
    if connections.is_empty() {
        completion.resolve();
        return completion;
    }

    debug!(
        connections = connections.len(),
        new_version = ?new_version,
        "broadcasting versionchange"
    );

    let pending: Arc<Mutex<HashSet<ConnectionId>>> =
        Arc::new(Mutex::new(connections.iter().map(|c| c.id()).collect()));

    for connection in &connections {
        let pending = Arc::clone(&pending);
        let completion = completion.clone();
        connection.on_close(move |id| {
            let drained = {
                let mut pending = pending.lock();
                pending.remove(&id);
                pending.is_empty()
            };
            if drained {
                completion.resolve();
            }
        });
    }

    for connection in connections {
        scheduler.spawn(move || {
            connection.dispatch_version_change(new_version);
        });
    }

    completion
}
