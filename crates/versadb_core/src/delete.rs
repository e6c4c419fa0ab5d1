//! The delete-request pipeline.

use crate::coordinator::fire_version_change;
use crate::error::CoreError;
use crate::factory::FactoryInner;
use crate::record::DatabaseRecord;
use crate::request::Request;
use crate::types::VersionChange;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) struct DeleteOperation {
    factory: Arc<FactoryInner>,
    request: Arc<Request>,
    name: String,
}

impl DeleteOperation {
    pub fn new(factory: Arc<FactoryInner>, request: Arc<Request>, name: String) -> Self {
        Self {
            factory,
            request,
            name,
        }
    }

    /// Queues the deletion.
    pub fn start(self) {
        let op = Arc::new(self);
        let scheduler = op.factory.scheduler.clone();
        scheduler.spawn(move || op.run());
    }

    fn run(self: &Arc<Self>) {
        let record = self.factory.registry.lock().databases.get(&self.name);
        let Some(record) = record else {
            self.request.succeed(None, None);
            return;
        };

        let old_version = record.version();
        info!(request = %self.request.id(), database = %self.name, old_version, "deleting database");
        record.mark_delete_pending();

        let completion = fire_version_change(
            &self.factory.registry,
            &self.factory.scheduler,
            &self.name,
            None,
        );
        if !completion.is_settled() {
            self.request.arm_blocked_timer(
                self.factory.config.delete_blocked_after,
                VersionChange::deletion(old_version),
                completion.clone(),
            );
        }

        let op = Arc::clone(self);
        completion.on_settled(move |outcome| match outcome {
            Ok(()) => op.finish(&record),
            Err(err) => op.rejected(&record, err.clone()),
        });
    }

    fn finish(&self, record: &Arc<DatabaseRecord>) {
        self.request.disarm_blocked_timer();

        if let Err(err) = self.factory.backend.destroy(&self.name) {
            self.rejected(record, err.into());
            return;
        }

        self.factory.registry.lock().databases.remove_record(record);
        info!(database = %self.name, "database deleted");
        self.request.succeed(Some(record.version()), None);
        record.signal_deleted();
    }

    fn rejected(&self, record: &Arc<DatabaseRecord>, err: CoreError) {
        warn!(database = %self.name, error = %err, "delete failed");
        record.clear_delete_pending();
        record.signal_ready();
        self.request.fail(err);
    }
}
