//! Cross-crate integration test helpers.
//!
//! Provides a harness that steps the scheduler one turn at a time and
//! samples both the backend's stored version and the registry record's
//! version after every turn, so tests can check that neither decreases.

use crate::fixtures::TestFactory;
use crate::recorder::{ConnectionLog, RequestLog};
use std::sync::Arc;
use versadb_core::Request;

/// A test harness for protocol scenarios against one database name.
pub struct ProtocolHarness {
    /// The factory under test.
    pub tf: TestFactory,
    name: String,
    observed: Vec<u64>,
    observed_records: Vec<u64>,
}

impl ProtocolHarness {
    /// Creates a harness over a fresh factory.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            tf: TestFactory::new(),
            name: name.into(),
            observed: Vec::new(),
            observed_records: Vec::new(),
        }
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens the database at `version`. The connection closes itself
    /// whenever it receives "versionchange".
    pub fn open_cooperative(&self, version: u64) -> (Arc<Request>, RequestLog) {
        let request = self.tf.open(&self.name, version);
        let log = RequestLog::attach(&request, self.tf.scheduler());
        let target = Arc::downgrade(&request);
        request.on_success(move |_| {
            if let Some(connection) = target.upgrade().and_then(|r| r.result()) {
                ConnectionLog::attach(&connection, true);
            }
        });
        (request, log)
    }

    /// Runs one turn and samples the stored and record versions.
    pub fn step(&mut self) -> bool {
        let ran = self.tf.scheduler().run_next();
        if let Some(version) = self.tf.stored_version(&self.name) {
            self.observed.push(version);
        }
        if let Some(record) = self.tf.record(&self.name) {
            self.observed_records.push(record.version());
        }
        ran
    }

    /// Runs turns until the scheduler is idle.
    pub fn run(&mut self) -> usize {
        let mut turns = 0;
        while self.step() {
            turns += 1;
        }
        turns
    }

    /// Returns the stored versions sampled so far.
    pub fn observed_versions(&self) -> &[u64] {
        &self.observed
    }

    /// Returns the registry record versions sampled so far.
    pub fn observed_record_versions(&self) -> &[u64] {
        &self.observed_records
    }

    /// Asserts that neither the sampled stored versions nor the sampled
    /// record versions ever decreased.
    pub fn assert_monotonic(&self) {
        assert!(
            is_monotonic(&self.observed),
            "stored version decreased: {:?}",
            self.observed
        );
        assert!(
            is_monotonic(&self.observed_records),
            "record version decreased: {:?}",
            self.observed_records
        );
    }
}

/// Returns true if `versions` never decreases.
pub fn is_monotonic(versions: &[u64]) -> bool {
    versions.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Opens `name` concurrently at every version in `versions`, with every
/// connection yielding to later upgrades, and returns the final stored
/// version along with each request's log.
pub fn concurrent_opens(versions: &[u64]) -> (u64, Vec<RequestLog>) {
    let mut harness = ProtocolHarness::new("concurrent");
    let logs: Vec<RequestLog> = versions
        .iter()
        .map(|&v| harness.open_cooperative(v).1)
        .collect();
    harness.run();
    harness.assert_monotonic();

    let stored = harness.tf.stored_version(harness.name()).unwrap_or(0);
    (stored, logs)
}
