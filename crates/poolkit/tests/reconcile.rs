//! Reconciliation of user-pool clients against the in-memory directory

use declarative::{
    AutoConfirm, AutoDecline, Controller, ControllerOptions, Deadline, DeleteOutcome, Document,
    EntityRecord, Error, ErrorCategory, ExecuteOptions, ExecutionPlan, LifecycleState, NoProgress,
    PlannedAction,
    ReadOutcome, RecordChange, RemoteError, RemoteErrorKind, ResourceIdentity, RetryConfig, Value,
    Verb, execute, refresh_all,
};
use poolkit::{MemoryDirectory, Operation, USER_POOL_CLIENT};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

fn fast() -> ControllerOptions {
    ControllerOptions {
        retry: RetryConfig::new(3, Duration::from_millis(1), 1.0),
        settle: RetryConfig::new(5, Duration::from_millis(1), 1.0),
    }
}

fn controller(directory: &MemoryDirectory) -> Controller<'_, MemoryDirectory> {
    Controller::with_options(&USER_POOL_CLIENT, directory, fast())
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(10))
}

fn app(name: &str, pool: &str) -> Document {
    Document::new().with("name", name).with("user_pool_id", pool)
}

fn create(directory: &MemoryDirectory, desired: &Document) -> EntityRecord {
    controller(directory).create(desired, deadline()).unwrap().record
}

fn unavailable() -> RemoteError {
    RemoteError::new(RemoteErrorKind::Unavailable, "InternalErrorException: try again")
}

#[test]
fn test_create_with_generated_secret() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let desired = app("app1", "pool1").with("generate_secret", true);

    let created = controller(&directory).create(&desired, deadline()).unwrap();
    let record = created.record;

    assert!(created.warnings.is_empty());
    assert_eq!(record.identity, ResourceIdentity::new("pool1", "c-1"));
    assert_eq!(record.observed.get_str("client_secret"), Some("sek-1"));
    assert_eq!(record.observed.get_bool("generate_secret"), Some(true));
    assert_eq!(record.observed.get_int("refresh_token_validity"), Some(30));
    assert_eq!(
        record.observed.get_str("prevent_user_existence_errors"),
        Some("LEGACY")
    );
}

#[test]
fn test_replanning_after_create_is_a_noop() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let desired = app("app1", "pool1")
        .with("generate_secret", true)
        .with("callback_urls", Value::set(["https://app.example.com/cb"]))
        .with(
            "analytics_configuration",
            Document::new().with("application_id", "pinpoint-1"),
        );
    let record = create(&directory, &desired);

    let plan = ExecutionPlan::build(
        &USER_POOL_CLIENT,
        &BTreeMap::from([("app1".to_string(), desired)]),
        &BTreeMap::from([("app1".to_string(), record)]),
    );
    assert_eq!(plan.summary().changes(), 0);
}

#[test]
fn test_secret_never_appears_in_diff() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1").with("generate_secret", true));

    let desired = app("app2", "pool1").with("generate_secret", true);
    let plan = ExecutionPlan::build(
        &USER_POOL_CLIENT,
        &BTreeMap::from([("app1".to_string(), desired)]),
        &BTreeMap::from([("app1".to_string(), record)]),
    );

    let entity = &plan.entities[0];
    let PlannedAction::Update(diff) = &entity.action else {
        panic!("expected an update, got {:?}", entity.action);
    };
    let rendered = format!("{diff:?}");
    assert!(rendered.contains("app2"));
    assert!(!rendered.contains("sek-1"));
}

#[test]
fn test_update_resends_whole_configuration() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let desired = app("app1", "pool1").with("read_attributes", Value::set(["email"]));
    let record = create(&directory, &desired);

    let renamed = desired.clone().with("name", "app2");
    let updated = controller(&directory)
        .update(&record, &renamed, deadline())
        .unwrap();

    assert_eq!(updated.identity, record.identity);
    assert_eq!(updated.observed.get_str("name"), Some("app2"));
    let stored = directory.client("pool1", "c-1").unwrap();
    assert_eq!(stored["ClientName"], json!("app2"));
    assert_eq!(stored["ReadAttributes"], json!(["email"]));
}

#[test]
fn test_update_refuses_replace_class_change() {
    let directory = MemoryDirectory::with_pools(["pool1", "pool2"]);
    let record = create(&directory, &app("app1", "pool1"));

    let err = controller(&directory)
        .update(&record, &app("app2", "pool2"), deadline())
        .unwrap_err();

    match err {
        Error::ReplaceRequired { fields, .. } => assert_eq!(fields, vec!["user_pool_id"]),
        other => panic!("expected ReplaceRequired, got {other}"),
    }
    assert_eq!(directory.count(Operation::Update), 0);
}

#[test]
fn test_replace_wins_over_update() {
    let directory = MemoryDirectory::with_pools(["pool1", "pool2"]);
    let record = create(&directory, &app("app1", "pool1"));

    let plan = ExecutionPlan::build(
        &USER_POOL_CLIENT,
        &BTreeMap::from([("web".to_string(), app("app2", "pool2"))]),
        &BTreeMap::from([("web".to_string(), record)]),
    );
    assert!(matches!(plan.entities[0].action, PlannedAction::Replace(_)));

    let ctl = controller(&directory);
    let report = execute(
        &ctl,
        plan,
        &ExecuteOptions::default(),
        &mut NoProgress,
        &mut AutoConfirm,
    )
    .unwrap();

    assert_eq!(report.summary.replaced, 1);
    assert!(directory.client("pool1", "c-1").is_none());
    let RecordChange::Store(fresh) = &report.entities[0].record else {
        panic!("expected a stored record");
    };
    assert_eq!(fresh.identity, ResourceIdentity::new("pool2", "c-2"));
}

#[test]
fn test_replace_with_invalid_desired_keeps_old_client() {
    let directory = MemoryDirectory::with_pools(["pool1", "pool2"]);
    let record = create(&directory, &app("app1", "pool1"));
    let desired = app("app1", "pool2").with("refresh_token_validity", 9999_i64);

    let plan = ExecutionPlan::build(
        &USER_POOL_CLIENT,
        &BTreeMap::from([("web".to_string(), desired)]),
        &BTreeMap::from([("web".to_string(), record)]),
    );
    assert!(matches!(plan.entities[0].action, PlannedAction::Replace(_)));

    let ctl = controller(&directory);
    let report = execute(
        &ctl,
        plan,
        &ExecuteOptions::default(),
        &mut NoProgress,
        &mut AutoConfirm,
    )
    .unwrap();

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.entities[0].record, RecordChange::Keep);
    assert_eq!(directory.count(Operation::Delete), 0);
    assert!(directory.client("pool1", "c-1").is_some());
}

#[test]
fn test_replace_keeps_unreadable_new_client() {
    let directory = MemoryDirectory::with_pools(["pool1", "pool2"]);
    let record = create(&directory, &app("app1", "pool1"));
    directory.fail_next(
        Operation::Describe,
        RemoteError::new(RemoteErrorKind::Unauthorized, "NotAuthorizedException: denied"),
    );

    let ctl = controller(&directory);
    let err = ctl.replace(&record, &app("app1", "pool2"), deadline()).unwrap_err();

    assert!(directory.client("pool1", "c-1").is_none());
    let tracked = err.tracked_record().expect("new client stays tracked");
    assert_eq!(tracked.identity, ResourceIdentity::new("pool2", "c-2"));
    assert_eq!(tracked.status, LifecycleState::Failed);
}

#[test]
fn test_declined_confirmation_changes_nothing() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1"));

    let plan = ExecutionPlan::destroy(&USER_POOL_CLIENT, &BTreeMap::from([("web".to_string(), record)]));
    let ctl = controller(&directory);
    let report = execute(
        &ctl,
        plan,
        &ExecuteOptions::default(),
        &mut NoProgress,
        &mut AutoDecline,
    )
    .unwrap();

    assert_eq!(report.summary.skipped, 1);
    assert_eq!(directory.count(Operation::Delete), 0);
    assert!(directory.client("pool1", "c-1").is_some());
}

#[test]
fn test_read_of_deleted_client_is_absent() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1"));
    directory.remove("pool1", "c-1");

    let ctl = controller(&directory);
    assert_eq!(
        ctl.read(&record.identity, deadline()).unwrap(),
        ReadOutcome::Absent
    );
    assert_eq!(ctl.refresh(&record, deadline()).unwrap(), None);
}

#[test]
fn test_delete_is_idempotent() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1"));

    let ctl = controller(&directory);
    assert_eq!(
        ctl.delete(&record.identity, deadline()).unwrap(),
        DeleteOutcome::Deleted
    );
    assert_eq!(
        ctl.delete(&record.identity, deadline()).unwrap(),
        DeleteOutcome::AlreadyAbsent
    );
}

#[test]
fn test_throttled_create_is_retried_without_warning() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    directory.fail_next(
        Operation::Create,
        RemoteError::new(RemoteErrorKind::Throttled, "TooManyRequestsException: slow down"),
    );

    let created = controller(&directory)
        .create(&app("app1", "pool1"), deadline())
        .unwrap();

    assert_eq!(directory.count(Operation::Create), 2);
    assert!(created.warnings.is_empty());
}

#[test]
fn test_ambiguous_create_failure_warns_about_orphans() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    directory.fail_next(Operation::Create, unavailable());

    let created = controller(&directory)
        .create(&app("app1", "pool1"), deadline())
        .unwrap();

    assert_eq!(created.warnings.len(), 1);
    assert!(created.warnings[0].contains("orphaned"));
    assert!(created.warnings[0].contains("pool1"));
}

#[test]
fn test_update_retries_exhausted() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1"));
    for _ in 0..3 {
        directory.fail_next(Operation::Update, unavailable());
    }

    let err = controller(&directory)
        .update(&record, &app("app2", "pool1"), deadline())
        .unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.category(), ErrorCategory::Unavailable);
    assert!(!err.leaves_state_unchanged());
}

#[test]
fn test_rejected_update_is_not_retried() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1"));
    directory.fail_next(
        Operation::Update,
        RemoteError::new(RemoteErrorKind::InvalidInput, "InvalidOAuthFlowException: nope"),
    );

    let err = controller(&directory)
        .update(&record, &app("app2", "pool1"), deadline())
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Rejected);
    assert_eq!(directory.count(Operation::Update), 1);
}

#[test]
fn test_expired_deadline_times_out() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = create(&directory, &app("app1", "pool1"));

    let err = controller(&directory)
        .read(&record.identity, Deadline::after(Duration::ZERO))
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { verb: Verb::Read, .. }));
    assert!(err.leaves_state_unchanged());
    assert_eq!(directory.count(Operation::Describe), 1);
}

#[test]
fn test_read_lag_is_absorbed_after_create() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    directory.set_read_lag(3);

    let record = create(&directory, &app("app1", "pool1"));

    assert_eq!(record.identity.resource_id, "c-1");
    assert_eq!(directory.count(Operation::Describe), 4);
}

#[test]
fn test_create_in_missing_pool_fails_without_record() {
    let directory = MemoryDirectory::new();

    let err = controller(&directory)
        .create(&app("app1", "pool1"), deadline())
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { verb: Verb::Create, .. }));
    assert_eq!(directory.count(Operation::Create), 3);
    assert!(directory.client_ids().is_empty());
}

#[test]
fn test_create_readback_failure_keeps_client_tracked() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    directory.fail_next(
        Operation::Describe,
        RemoteError::new(RemoteErrorKind::Unauthorized, "NotAuthorizedException: denied"),
    );
    let desired = app("app1", "pool1").with("generate_secret", true);

    let plan = ExecutionPlan::build(
        &USER_POOL_CLIENT,
        &BTreeMap::from([("web".to_string(), desired.clone())]),
        &BTreeMap::new(),
    );
    let ctl = controller(&directory);
    let report = execute(
        &ctl,
        plan,
        &ExecuteOptions::default(),
        &mut NoProgress,
        &mut AutoConfirm,
    )
    .unwrap();

    assert_eq!(report.summary.failed, 1);
    assert_eq!(directory.client_ids(), vec!["c-1".to_string()]);
    let entity = &report.entities[0];
    let RecordChange::Store(tracked) = &entity.record else {
        panic!("expected the created client to be tracked");
    };
    assert_eq!(tracked.identity, ResourceIdentity::new("pool1", "c-1"));
    assert_eq!(tracked.status, LifecycleState::Failed);
    assert!(!tracked.observed.contains("client_secret"));
    assert!(entity.warnings[0].contains("pool1/c-1"));

    // The next apply converges the tracked client in place
    let recovered = ctl.update(tracked, &desired, deadline()).unwrap();
    assert_eq!(recovered.status, LifecycleState::Stable);
    assert_eq!(recovered.identity, tracked.identity);
    assert_eq!(recovered.observed.get_str("client_secret"), Some("sek-1"));
    assert_eq!(directory.count(Operation::Create), 1);
}

#[test]
fn test_update_without_changes_clears_failed_status() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let record = EntityRecord {
        status: LifecycleState::Failed,
        ..create(&directory, &app("app1", "pool1"))
    };

    let updated = controller(&directory)
        .update(&record, &app("app1", "pool1"), deadline())
        .unwrap();

    assert_eq!(updated.status, LifecycleState::Stable);
    assert_eq!(updated.observed, record.observed);
    assert_eq!(directory.count(Operation::Update), 0);
}

#[test]
fn test_invalid_desired_state_sends_nothing() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let urls = Value::set((0..101).map(|i| format!("https://app.example.com/{i}")));

    let err = controller(&directory)
        .create(&app("app1", "pool1").with("callback_urls", urls), deadline())
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Invalid);
    assert!(err.to_string().contains("callback_urls"));
    assert!(directory.calls().is_empty());
}

#[test]
fn test_import() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    create(&directory, &app("app1", "pool1").with("generate_secret", true));

    let imported = controller(&directory).import("pool1/c-1", deadline()).unwrap();

    assert_eq!(imported.record.identity, ResourceIdentity::new("pool1", "c-1"));
    assert_eq!(imported.record.observed.get_str("client_secret"), Some("sek-1"));
    assert_eq!(imported.seed.get_str("name"), Some("app1"));
    assert!(!imported.seed.contains("client_secret"));
}

#[test]
fn test_import_rejects_bad_identifiers() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let ctl = controller(&directory);

    for identifier in ["pool1", "pool1/", "/c-1", "a/b/c"] {
        let err = ctl.import(identifier, deadline()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{identifier}");
    }
    assert!(directory.calls().is_empty());

    let err = ctl.import("pool1/c-9", deadline()).unwrap_err();
    assert!(matches!(err, Error::NotFound { verb: Verb::Import, .. }));
}

#[test]
fn test_refresh_detects_drift() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let desired = app("app1", "pool1").with("generate_secret", true);
    let record = create(&directory, &desired);
    directory.tamper("pool1", "c-1", "ClientName", json!("renamed"));

    let records = BTreeMap::from([("web".to_string(), record)]);
    let ctl = controller(&directory);
    let report = refresh_all(&ctl, &records, &ExecuteOptions::default()).unwrap();

    let RecordChange::Store(fresh) = &report.entities[0].record else {
        panic!("expected a refreshed record");
    };
    assert_eq!(fresh.observed.get_str("name"), Some("renamed"));
    assert_eq!(fresh.observed.get_bool("generate_secret"), Some(true));

    let plan = ExecutionPlan::build(
        &USER_POOL_CLIENT,
        &BTreeMap::from([("web".to_string(), desired)]),
        &BTreeMap::from([("web".to_string(), fresh.clone())]),
    );
    assert!(matches!(plan.entities[0].action, PlannedAction::Update(_)));
}

#[test]
fn test_execute_many_clients_in_parallel() {
    let directory = MemoryDirectory::with_pools(["pool1"]);
    let desired: BTreeMap<String, Document> = (0..8)
        .map(|i| (format!("app{i}"), app(&format!("app{i}"), "pool1")))
        .collect();

    let plan = ExecutionPlan::build(&USER_POOL_CLIENT, &desired, &BTreeMap::new());
    let ctl = controller(&directory);
    let report = execute(
        &ctl,
        plan,
        &ExecuteOptions::default(),
        &mut NoProgress,
        &mut AutoConfirm,
    )
    .unwrap();

    assert_eq!(report.summary.created, 8);
    assert_eq!(directory.client_ids().len(), 8);

    let mut records = BTreeMap::new();
    report.apply_to(&mut records);
    assert_eq!(records.len(), 8);
}
