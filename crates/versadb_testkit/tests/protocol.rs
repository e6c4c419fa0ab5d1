//! Protocol tests across the codec, storage, and core crates.

use proptest::prelude::*;
use std::sync::Arc;
use versadb_codec::Value;
use versadb_core::{CoreError, Factory, FactoryConfig, VersionChange};
use versadb_storage::StorageBackend;
use versadb_testkit::prelude::*;

// ============================================================================
// Version negotiation
// ============================================================================

#[test]
fn test_lower_version_is_version_error() {
    let tf = TestFactory::new();
    let connection = tf.connect("db", 5);
    connection.close();

    let request = tf.open("db", 4);
    let log = RequestLog::attach(&request, tf.scheduler());
    tf.settle();

    assert_eq!(log.events(), vec![RequestEvent::Error("VersionError".into())]);
    assert_eq!(request.error(), Some(CoreError::version(4, 5)));
    assert_eq!(tf.stored_version("db"), Some(5));
    assert_eq!(tf.connections("db"), 0);
}

#[test]
fn test_equal_version_connects_without_upgrade() {
    let tf = TestFactory::new();
    tf.connect("db", 2);

    let request = tf.open("db", 2);
    let log = RequestLog::attach(&request, tf.scheduler());
    tf.settle();

    assert_eq!(log.events(), vec![RequestEvent::Success(Some(2), Some(2))]);
    assert_eq!(tf.backend().commits(), 1);
    assert_eq!(tf.connections("db"), 2);
}

#[test]
fn test_default_version_is_one() {
    let tf = TestFactory::new();
    let request = tf.factory.open("db");
    tf.settle();
    assert_eq!(request.result().unwrap().version(), 1);
}

#[test]
fn test_configured_default_version() {
    let tf = TestFactory::with_config(FactoryConfig::new().default_version(4));
    let request = tf.factory.open("db");
    tf.settle();
    assert_eq!(request.result().unwrap().version(), 4);
}

#[test]
fn test_upgrade_notifies_open_connections() {
    let tf = TestFactory::new();
    let first = tf.connect("db", 1);
    let first_log = ConnectionLog::attach(&first, true);

    let request = tf.open("db", 3);
    let log = RequestLog::attach(&request, tf.scheduler());
    assert!(first_log.changes().is_empty());
    tf.settle();

    assert_eq!(first_log.changes(), vec![VersionChange::upgrade(1, 3)]);
    assert_eq!(
        log.events(),
        vec![
            RequestEvent::UpgradeNeeded(1, 3),
            RequestEvent::Success(Some(1), Some(3)),
        ]
    );
}

#[test]
fn test_upgrade_blocked_after_1000_ticks() {
    let tf = TestFactory::new();
    let holdout = tf.connect("db", 1);

    let request = tf.open("db", 2);
    let log = RequestLog::attach(&request, tf.scheduler());
    tf.advance(999);
    assert_eq!(log.blocked_count(), 0);
    tf.advance(1);
    assert_eq!(
        log.timeline(),
        vec![(1000, RequestEvent::Blocked(VersionChange::upgrade(1, 2)))]
    );

    holdout.close();
    tf.settle();
    assert_eq!(log.outcome(), Some(RequestEvent::Success(Some(1), Some(2))));
    assert_eq!(log.blocked_count(), 1);
}

#[test]
fn test_upgrade_timer_cancelled_once_started() {
    let tf = TestFactory::new();
    let holdout = tf.connect("db", 1);
    let request = tf.open("db", 2);
    let log = RequestLog::attach(&request, tf.scheduler());
    tf.settle();
    assert_eq!(tf.scheduler().pending_timers(), 1);

    holdout.close();
    tf.settle();
    assert_eq!(tf.scheduler().pending_timers(), 0);
    tf.advance(10_000);
    assert_eq!(log.blocked_count(), 0);
}

#[test]
fn test_schema_changes_are_persisted() {
    let tf = TestFactory::new();
    let request = tf.open("db", 1);
    request.on_upgrade_needed(|event| {
        event.connection.create_object_store("books").unwrap();
        event.connection.create_object_store("authors").unwrap();
    });
    tf.settle();

    let snapshot = tf.backend().inner().snapshot("db").unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.store_names, vec!["authors", "books"]);

    let later = tf.connect("db", 1);
    assert_eq!(later.object_store_names(), vec!["authors", "books"]);
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn test_delete_unknown_succeeds_in_same_turn() {
    let tf = TestFactory::new();
    let request = tf.delete_database("ghost");
    let log = RequestLog::attach(&request, tf.scheduler());

    assert!(tf.scheduler().run_next());
    assert_eq!(log.events(), vec![RequestEvent::Success(None, None)]);
    assert_eq!(tf.backend().destroys(), 0);
}

#[test]
fn test_delete_without_connections_succeeds_in_same_turn() {
    let tf = TestFactory::new();
    tf.connect("db", 2).close();

    let request = tf.delete_database("db");
    let log = RequestLog::attach(&request, tf.scheduler());
    assert!(tf.scheduler().run_next());

    assert_eq!(log.events(), vec![RequestEvent::Success(Some(2), None)]);
    assert_eq!(log.blocked_count(), 0);
    assert!(tf.databases().is_empty());
    assert!(!tf.backend().exists("db"));
}

#[test]
fn test_delete_blocked_once_by_stubborn_connection() {
    let tf = TestFactory::new();
    let holdout = tf.connect("db", 1);
    let holdout_log = ConnectionLog::attach(&holdout, false);

    let request = tf.delete_database("db");
    let log = RequestLog::attach(&request, tf.scheduler());
    tf.advance(500);
    tf.advance(100_000);

    assert_eq!(holdout_log.changes(), vec![VersionChange::deletion(1)]);
    assert_eq!(
        log.timeline(),
        vec![(500, RequestEvent::Blocked(VersionChange::deletion(1)))]
    );
    assert!(!request.is_done());

    holdout.close();
    assert_eq!(log.outcome(), Some(RequestEvent::Success(Some(1), None)));
    assert_eq!(log.terminal_count(), 1);
}

#[test]
fn test_open_waits_for_pending_delete() {
    let tf = TestFactory::new();
    let holdout = tf.connect("db", 3);

    let delete = tf.delete_database("db");
    let delete_log = RequestLog::attach(&delete, tf.scheduler());
    tf.settle();

    let open = tf.open("db", 1);
    let open_log = RequestLog::attach(&open, tf.scheduler());
    tf.settle();
    assert!(open_log.events().is_empty());

    holdout.close();
    tf.settle();
    assert_eq!(delete_log.outcome(), Some(RequestEvent::Success(Some(3), None)));
    assert_eq!(
        open_log.events(),
        vec![
            RequestEvent::UpgradeNeeded(0, 1),
            RequestEvent::Success(Some(0), Some(1)),
        ]
    );
    assert_eq!(tf.stored_version("db"), Some(1));
}

#[test]
fn test_destroy_failure_keeps_database() {
    let backend = Arc::new(FailingBackend::new(FailureMode::Destroy));
    let factory = Factory::new(Arc::clone(&backend) as Arc<dyn StorageBackend>);
    let open = factory.open("db");
    factory.scheduler().run_until_idle();
    open.result().unwrap().close();

    let delete = factory.delete_database("db");
    let log = RequestLog::attach(&delete, factory.scheduler());
    factory.scheduler().run_until_idle();
    assert_eq!(log.outcome(), Some(RequestEvent::Error("QuotaExceededError".into())));

    let reopen = factory.open("db");
    factory.scheduler().run_until_idle();
    assert_eq!(reopen.result().unwrap().version(), 1);
}

#[test]
fn test_delete_while_upgrade_blocked_defers_open() {
    let tf = TestFactory::new();
    let holdout = tf.connect("db", 1);

    let upgrade = tf.open("db", 2);
    let upgrade_log = RequestLog::attach(&upgrade, tf.scheduler());
    tf.settle();

    let delete = tf.delete_database("db");
    let delete_log = RequestLog::attach(&delete, tf.scheduler());
    tf.settle();
    let doomed = tf.record("db").expect("Failed to find record");
    assert!(doomed.is_delete_pending());

    holdout.close();
    assert_eq!(delete_log.outcome(), Some(RequestEvent::Success(Some(1), None)));
    assert!(!upgrade.is_done());
    tf.settle();

    // The open waited out the deletion and recreated the database
    assert_eq!(
        upgrade_log.events(),
        vec![
            RequestEvent::UpgradeNeeded(0, 2),
            RequestEvent::Success(Some(0), Some(2)),
        ]
    );
    assert!(doomed.is_deleted());
    let current = tf.record("db").expect("Failed to find recreated record");
    assert!(!Arc::ptr_eq(&doomed, &current));
    assert!(!current.is_delete_pending());
    assert_eq!(tf.stored_version("db"), Some(2));
    assert_eq!(tf.connections("db"), 1);
}

#[test]
fn test_delete_during_upgrade_fails_open() {
    let tf = TestFactory::new();
    tf.connect("db", 1).close();

    let upgrade = tf.open("db", 2);
    let upgrade_log = RequestLog::attach(&upgrade, tf.scheduler());
    let delete = Arc::new(parking_lot::Mutex::new(None));
    let (slot, factory) = (Arc::clone(&delete), tf.factory.clone());
    upgrade.on_upgrade_needed(move |_| *slot.lock() = Some(factory.delete_database("db")));
    tf.settle();

    assert_eq!(
        upgrade_log.events(),
        vec![
            RequestEvent::UpgradeNeeded(1, 2),
            RequestEvent::Error("AbortError".into()),
        ]
    );
    assert!(upgrade.result().is_none());

    let delete = delete.lock().take().expect("Failed to capture delete request");
    assert_eq!(delete.error(), None);
    assert!(delete.is_done());
    assert!(tf.databases().is_empty());
    assert_eq!(tf.stored_version("db"), None);
    assert_eq!(tf.connections("db"), 0);
}

// ============================================================================
// Races
// ============================================================================

#[test]
fn test_concurrent_opens_create_one_record() {
    let tf = TestFactory::new();
    let first = tf.open("fresh", 1);
    let second = tf.open("fresh", 1);
    let (log1, log2) = (
        RequestLog::attach(&first, tf.scheduler()),
        RequestLog::attach(&second, tf.scheduler()),
    );
    tf.settle();

    assert_eq!(tf.backend().loads(), 1);
    assert_eq!(log1.terminal_count(), 1);
    assert_eq!(log2.terminal_count(), 1);
    assert_eq!(log1.outcome(), Some(RequestEvent::Success(Some(0), Some(1))));
    assert_eq!(log2.outcome(), Some(RequestEvent::Success(Some(1), Some(1))));
    assert_eq!(tf.databases(), vec![("fresh".to_string(), 1)]);
    assert_eq!(tf.connections("fresh"), 2);
}

#[test]
fn test_load_failure_reported_and_retryable() {
    let backend = Arc::new(FailingBackend::new(FailureMode::Load));
    let factory = Factory::new(Arc::clone(&backend) as Arc<dyn StorageBackend>);

    let first = factory.open("db");
    let waiting = factory.open("db");
    let log = RequestLog::attach(&first, factory.scheduler());
    let waiting_log = RequestLog::attach(&waiting, factory.scheduler());
    factory.scheduler().run_until_idle();

    assert_eq!(log.outcome(), Some(RequestEvent::Error("QuotaExceededError".into())));
    // The waiter retried and created a fresh record, which failed too
    assert_eq!(waiting_log.outcome(), Some(RequestEvent::Error("QuotaExceededError".into())));
    assert!(factory.databases().is_empty());

    backend.disarm();
    let retry = factory.open("db");
    factory.scheduler().run_until_idle();
    assert_eq!(retry.result().unwrap().version(), 1);
}

#[test]
fn test_commit_failure_fails_request() {
    let backend = Arc::new(FailingBackend::new(FailureMode::Commit));
    let factory = Factory::new(Arc::clone(&backend) as Arc<dyn StorageBackend>);
    let request = factory.open_version("db", 2).unwrap();
    let log = RequestLog::attach(&request, factory.scheduler());
    factory.scheduler().run_until_idle();

    assert_eq!(
        log.events(),
        vec![
            RequestEvent::UpgradeNeeded(0, 2),
            RequestEvent::Error("QuotaExceededError".into()),
        ]
    );
    assert_eq!(factory.databases(), vec![("db".to_string(), 0)]);
    assert_eq!(factory.connections("db"), 0);
}

#[test]
fn test_aborted_upgrade_leaves_record_ready() {
    let tf = TestFactory::new();
    tf.connect("db", 1).close();

    let request = tf.open("db", 2);
    let log = RequestLog::attach(&request, tf.scheduler());
    request.on_upgrade_needed(|event| {
        event.connection.create_object_store("doomed").unwrap();
        event.transaction.abort().unwrap();
    });
    tf.settle();

    assert_eq!(log.outcome(), Some(RequestEvent::Error("AbortError".into())));
    assert!(request.result().is_none());
    assert_eq!(tf.stored_version("db"), Some(1));
    assert!(tf.record("db").unwrap().is_ready());

    let next = tf.open("db", 1);
    let next_log = RequestLog::attach(&next, tf.scheduler());
    tf.settle();
    assert_eq!(next_log.outcome(), Some(RequestEvent::Success(Some(1), Some(1))));
}

#[test]
fn test_closing_upgrading_connection_aborts() {
    let tf = TestFactory::new();
    let request = tf.open("db", 1);
    let log = RequestLog::attach(&request, tf.scheduler());
    request.on_upgrade_needed(|event| event.connection.close());
    tf.settle();

    assert_eq!(log.outcome(), Some(RequestEvent::Error("AbortError".into())));
    assert_eq!(tf.connections("db"), 0);
    assert_eq!(tf.stored_version("db"), Some(0));
}

#[test]
fn test_independent_factories_share_nothing() {
    let a = TestFactory::new();
    let b = TestFactory::new();
    a.connect("db", 3);
    assert!(b.databases().is_empty());
    assert_eq!(b.connect("db", 1).version(), 1);
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_factory_cmp() {
    let tf = TestFactory::new();
    assert_eq!(tf.cmp(&Value::from(1), &Value::from(2)).unwrap(), -1);
    assert_eq!(tf.cmp(&Value::from("a"), &Value::from("a")).unwrap(), 0);
    let err = tf
        .cmp(&Value::empty_object(), &Value::empty_object())
        .unwrap_err();
    assert_eq!(err.name(), "DataError");
}

#[test]
fn test_open_values_argument_shapes() {
    let tf = TestFactory::new();
    assert_eq!(
        tf.open_values(&Value::from(7), None, None).unwrap_err().name(),
        "TypeError"
    );
    let options = Value::object([("notes", Value::empty_object())]);
    let request = tf
        .open_values(&Value::from("db"), Some(&options), None)
        .unwrap();
    tf.settle();
    let connection = request.result().unwrap();
    assert_eq!(connection.version(), 1);
    assert_eq!(connection.object_store_names(), vec!["notes"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_concurrent_opens_reach_max(versions in version_sequence_strategy(6, 6)) {
        let max = *versions.iter().max().unwrap();
        let mut harness = ProtocolHarness::new("db");
        let logs: Vec<RequestLog> = versions
            .iter()
            .map(|&v| harness.open_cooperative(v).1)
            .collect();
        harness.run();

        prop_assert!(is_monotonic(harness.observed_versions()));
        prop_assert!(is_monotonic(harness.observed_record_versions()));
        prop_assert_eq!(harness.tf.stored_version("db"), Some(max));
        prop_assert_eq!(harness.observed_record_versions().last(), Some(&max));
        for log in &logs {
            prop_assert_eq!(log.terminal_count(), 1);
        }
    }

    #[test]
    fn prop_concurrent_opens_helper_reaches_max(versions in version_sequence_strategy(4, 4)) {
        let (stored, _) = concurrent_opens(&versions);
        prop_assert_eq!(stored, *versions.iter().max().unwrap());
    }

    #[test]
    fn prop_lower_version_never_changes_store(current in 2u64..10, delta in 1u64..10) {
        let tf = TestFactory::new();
        tf.connect("db", current).close();
        let requested = current.saturating_sub(delta).max(1);
        prop_assume!(requested < current);

        let request = tf.open("db", requested);
        tf.settle();
        prop_assert_eq!(request.error().map(|e| e.name().to_string()), Some("VersionError".to_string()));
        prop_assert_eq!(tf.stored_version("db"), Some(current));
    }

    #[test]
    fn prop_cmp_matches_antisymmetry(a in key_strategy(), b in key_strategy()) {
        let tf = TestFactory::new();
        let ab = tf.cmp(&a, &b).unwrap();
        let ba = tf.cmp(&b, &a).unwrap();
        prop_assert_eq!(ab, -ba);
    }

    #[test]
    fn prop_invalid_keys_are_data_errors(a in key_strategy(), bad in invalid_key_strategy()) {
        let tf = TestFactory::new();
        let err_ab = tf.cmp(&a, &bad).unwrap_err();
        prop_assert_eq!(err_ab.name(), "DataError");
        let err_ba = tf.cmp(&bad, &a).unwrap_err();
        prop_assert_eq!(err_ba.name(), "DataError");
    }

    #[test]
    fn prop_names_round_trip_through_registry(name in database_name_strategy()) {
        let tf = TestFactory::new();
        tf.connect(&name, 1);
        prop_assert_eq!(tf.connections(&name), 1);
        prop_assert_eq!(tf.databases().len(), 1);
    }
}
