//! The open-request pipeline.
//!
//! ```text
//! Lookup --absent--> Create --loaded--> Connect
//!   |                  '--load failed--> error
//!   |--busy--> Wait --ready/delete/done--> Lookup
//!   '--ready--> Connect --stored > requested--> VersionError
//!                  |----stored == requested--> success
//!                  '----stored < requested--> Upgrade
//! ```
//!
//! Every step runs inside one scheduler turn. A step that has to wait
//! subscribes to the relevant signal and returns.

use crate::connection::Connection;
use crate::coordinator::fire_version_change;
use crate::error::CoreError;
use crate::factory::FactoryInner;
use crate::record::DatabaseRecord;
use crate::request::{Request, UpgradeNeeded};
use crate::transaction::{TransactionState, VersionChangeTransaction};
use crate::types::VersionChange;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use versadb_storage::{DatabaseOptions, StoredDatabase};

pub(crate) struct OpenOperation {
    factory: Arc<FactoryInner>,
    request: Arc<Request>,
    name: String,
    version: u64,
    options: DatabaseOptions,
}

impl OpenOperation {
    pub fn new(
        factory: Arc<FactoryInner>,
        request: Arc<Request>,
        name: String,
        version: u64,
        options: DatabaseOptions,
    ) -> Self {
        Self {
            factory,
            request,
            name,
            version,
            options,
        }
    }

    /// Queues the first lookup.
    pub fn start(self) {
        Arc::new(self).retry();
    }

    fn retry(self: &Arc<Self>) {
        let op = Arc::clone(self);
        self.factory.scheduler.spawn(move || op.lookup());
    }

    fn lookup(self: &Arc<Self>) {
        let (record, created) = {
            let mut registry = self.factory.registry.lock();
            match registry.databases.get(&self.name) {
                Some(record) => (record, false),
                None => {
                    let record = DatabaseRecord::new(self.name.clone());
                    registry.databases.insert(Arc::clone(&record));
                    (record, true)
                }
            }
        };

        if created {
            self.create(record);
            return;
        }

        if let Some(txn) = record.version_change_transaction() {
            debug!(request = %self.request.id(), database = %self.name, "waiting for version change");
            let op = Arc::clone(self);
            txn.on_done(move |_| op.retry());
            return;
        }

        if record.is_delete_pending() || !record.is_ready() {
            self.wait_for(&record);
            return;
        }

        self.connect(record);
    }

    /// Waits for the record to become ready or be deleted, whichever first.
    fn wait_for(self: &Arc<Self>, record: &Arc<DatabaseRecord>) {
        debug!(
            request = %self.request.id(),
            database = %self.name,
            delete_pending = record.is_delete_pending(),
            "waiting for database"
        );

        let woken = Arc::new(AtomicBool::new(false));
        let deleted_listener = Arc::new(Mutex::new(None));

        let ready_listener = {
            let op = Arc::clone(self);
            let woken = Arc::clone(&woken);
            let weak = Arc::downgrade(record);
            let deleted_listener = Arc::clone(&deleted_listener);
            record.on_ready(move || {
                if woken.swap(true, AtomicOrdering::SeqCst) {
                    return;
                }
                if let (Some(record), Some(id)) = (weak.upgrade(), deleted_listener.lock().take()) {
                    record.off_deleted(id);
                }
                op.retry();
            })
        };

        let op = Arc::clone(self);
        let weak = Arc::downgrade(record);
        let id = record.on_deleted(move || {
            if woken.swap(true, AtomicOrdering::SeqCst) {
                return;
            }
            if let Some(record) = weak.upgrade() {
                record.off_ready(ready_listener);
            }
            op.retry();
        });
        *deleted_listener.lock() = Some(id);
    }

    fn create(self: &Arc<Self>, record: Arc<DatabaseRecord>) {
        info!(request = %self.request.id(), database = %self.name, "creating database record");

        let loaded = {
            let op = Arc::clone(self);
            let weak = Arc::downgrade(&record);
            move || {
                if let Some(record) = weak.upgrade() {
                    op.connect(record);
                }
            }
        };
        let failed = {
            let op = Arc::clone(self);
            let weak = Arc::downgrade(&record);
            move |err: &CoreError| {
                if let Some(record) = weak.upgrade() {
                    op.load_failed(&record, err.clone());
                }
            }
        };
        record.on_load(loaded, failed);

        let backend = Arc::clone(&self.factory.backend);
        let options = self.options.clone();
        self.factory
            .scheduler
            .spawn(move || record.load(backend.as_ref(), &options));
    }

    fn load_failed(&self, record: &Arc<DatabaseRecord>, err: CoreError) {
        self.factory.registry.lock().databases.remove_record(record);
        self.request.fail(err);
        record.signal_deleted();
    }

    fn connect(self: &Arc<Self>, record: Arc<DatabaseRecord>) {
        let registered = self.factory.registry.lock().databases.contains_record(&record);
        if !registered || record.is_delete_pending() {
            self.retry();
            return;
        }

        let stored = record.version();
        let connection = Connection::new(self.factory.next_connection_id(), Arc::clone(&record));

        match stored.cmp(&self.version) {
            Ordering::Greater => {
                connection.close();
                self.request.fail(CoreError::version(self.version, stored));
            }
            Ordering::Equal => {
                if let Err(err) = self.factory.track_connection(&connection) {
                    connection.close();
                    self.request.fail(err);
                    return;
                }
                debug!(request = %self.request.id(), connection = %connection.id(), version = stored, "connected");
                self.request.set_result(connection);
                self.request.succeed(Some(stored), Some(stored));
            }
            Ordering::Less => self.upgrade(record, connection),
        }
    }

    fn upgrade(self: &Arc<Self>, record: Arc<DatabaseRecord>, connection: Arc<Connection>) {
        let old_version = record.version();
        let new_version = self.version;
        info!(
            request = %self.request.id(),
            database = %self.name,
            old_version,
            new_version,
            "upgrade needed"
        );

        let completion = fire_version_change(
            &self.factory.registry,
            &self.factory.scheduler,
            &self.name,
            Some(new_version),
        );
        record.begin_upgrade();

        if let Err(err) = self.factory.track_connection(&connection) {
            connection.close();
            record.signal_ready();
            self.request.fail(err);
            return;
        }

        if !completion.is_settled() {
            self.request.arm_blocked_timer(
                self.factory.config.upgrade_blocked_after,
                VersionChange::upgrade(old_version, new_version),
                completion.clone(),
            );
        }

        let op = Arc::clone(self);
        completion.on_settled(move |outcome| {
            op.request.disarm_blocked_timer();
            match outcome {
                Ok(()) => op.run_upgrade(record, connection, old_version),
                Err(err) => op.upgrade_rejected(&record, &connection, err.clone()),
            }
        });
    }

    fn run_upgrade(
        self: &Arc<Self>,
        record: Arc<DatabaseRecord>,
        connection: Arc<Connection>,
        old_version: u64,
    ) {
        if record.is_delete_pending() {
            debug!(
                request = %self.request.id(),
                database = %self.name,
                "deletion requested while blocked, waiting for it"
            );
            record.signal_ready();
            connection.close();
            self.retry();
            return;
        }

        let new_version = self.version;
        let txn = connection.begin_version_change(new_version, self.factory.scheduler.clone());
        if let Err(err) = record.mark_version_change_started(Arc::clone(&txn)) {
            connection.close();
            record.signal_ready();
            self.request.fail(err);
            return;
        }

        {
            let op = Arc::clone(self);
            let record = Arc::clone(&record);
            let connection = Arc::clone(&connection);
            let weak: Weak<VersionChangeTransaction> = Arc::downgrade(&txn);
            txn.on_start(move || {
                let Some(transaction) = weak.upgrade() else {
                    return;
                };
                op.request.disarm_blocked_timer();
                record.set_version(new_version);
                connection.set_version(new_version);
                op.request.fire_upgrade_needed(UpgradeNeeded {
                    old_version,
                    new_version,
                    connection,
                    transaction,
                });
            });
        }
        {
            let op = Arc::clone(self);
            txn.on_done(move |state| match state {
                TransactionState::Complete => {
                    op.upgrade_committed(&record, &connection, old_version);
                }
                _ => op.upgrade_aborted(&record, &connection, old_version),
            });
        }

        self.factory.scheduler.spawn(move || txn.start());
    }

    fn upgrade_committed(
        &self,
        record: &Arc<DatabaseRecord>,
        connection: &Arc<Connection>,
        old_version: u64,
    ) {
        if record.is_delete_pending() {
            warn!(database = %self.name, "database deleted during upgrade");
            record.set_version(old_version);
            connection.finish_version_change();
            connection.close();
            record.signal_ready();
            self.request.fail(CoreError::abort(format!(
                "database {} was deleted during upgrade",
                self.name
            )));
            return;
        }

        let stored = StoredDatabase {
            version: self.version,
            store_names: connection.object_store_names(),
        };

        if let Err(err) = self.factory.backend.commit_upgrade(&self.name, &stored) {
            warn!(database = %self.name, error = %err, "upgrade commit failed");
            record.set_version(old_version);
            connection.finish_version_change();
            connection.close();
            record.signal_ready();
            self.request.fail(err.into());
            return;
        }

        info!(database = %self.name, old_version, new_version = self.version, "upgrade complete");
        record.set_store_names(stored.store_names);
        connection.finish_version_change();
        record.signal_ready();
        self.request.succeed(Some(old_version), Some(self.version));
    }

    fn upgrade_aborted(
        &self,
        record: &Arc<DatabaseRecord>,
        connection: &Arc<Connection>,
        old_version: u64,
    ) {
        warn!(database = %self.name, old_version, new_version = self.version, "upgrade aborted");
        record.set_version(old_version);
        record.signal_ready();
        connection.reset();
        connection.close();
        self.request.fail(CoreError::upgrade_aborted(
            self.name.clone(),
            old_version,
            self.version,
        ));
    }

    fn upgrade_rejected(
        &self,
        record: &Arc<DatabaseRecord>,
        connection: &Arc<Connection>,
        err: CoreError,
    ) {
        warn!(database = %self.name, error = %err, "version change rejected");
        record.signal_ready();
        connection.close();
        self.request.fail(err);
    }
}
