use std::sync::Arc;

use varhydrate::core::{HydrateError, Label, NewVariable, Variable, VariableArguments};
use varhydrate::hydrate::HydrationOptions;
use varhydrate::notify::{NotificationKind, NotificationLevel};
use varhydrate::persistence::InMemoryPersistence;
use varhydrate::service::VariableService;
use varhydrate::store::RemoteDataState;
use varhydrate::test_utils::{FlakyPersistence, MemoryNotifier, RecordingExecutor, org_variables};

struct Harness {
    service: VariableService,
    persistence: FlakyPersistence,
    notifier: MemoryNotifier,
}

fn harness(executor: RecordingExecutor) -> Harness {
    let persistence = FlakyPersistence::new(InMemoryPersistence::with_variables(org_variables()));
    let notifier = MemoryNotifier::new();
    let service = VariableService::new(
        HydrationOptions {
            org_id: "org".to_string(),
            ..HydrationOptions::default()
        },
        Arc::new(persistence.clone()),
        Arc::new(executor),
        Arc::new(notifier.clone()),
    );
    Harness {
        service,
        persistence,
        notifier,
    }
}

fn constant(name: &str, values: &[&str]) -> NewVariable {
    NewVariable {
        name: name.to_string(),
        arguments: VariableArguments::Constant {
            values: values.iter().map(|v| v.to_string()).collect(),
        },
        labels: Vec::new(),
    }
}

#[tokio::test]
async fn test_load_variables_sets_list_status() {
    let h = harness(RecordingExecutor::new());
    assert_eq!(h.service.store().list_status(), RemoteDataState::NotStarted);

    let variables = h.service.load_variables().await.unwrap();
    assert_eq!(variables.len(), 5);
    assert_eq!(h.service.store().list_status(), RemoteDataState::Done);
    assert_eq!(h.service.store().variables().len(), 5);
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_load_variables_failure_notifies_once() {
    let h = harness(RecordingExecutor::new());
    h.persistence.fail("list");

    let err = h.service.load_variables().await.unwrap_err();
    assert!(matches!(err, HydrateError::Persistence { .. }));
    assert_eq!(h.service.store().list_status(), RemoteDataState::Error);
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::GetVariablesFailed]);
}

#[tokio::test]
async fn test_load_missing_variable() {
    let h = harness(RecordingExecutor::new());

    let err = h.service.load_variable("nope").await.unwrap_err();
    assert!(matches!(err, HydrateError::NotFound { .. }));
    assert_eq!(h.service.store().variable("nope").unwrap().status, RemoteDataState::Error);
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::GetVariableFailed]);
}

#[tokio::test]
async fn test_create_variable() {
    let h = harness(RecordingExecutor::new());

    let created = h.service.create_variable(constant("env", &["prod"])).await.unwrap();
    assert_eq!(created.org_id, "org");
    assert_eq!(h.service.store().variable(&created.id).unwrap().status, RemoteDataState::Done);

    let notifications = h.notifier.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Success);
    assert!(notifications[0].message.contains("env"));
}

#[tokio::test]
async fn test_create_duplicate_name() {
    let h = harness(RecordingExecutor::new());

    let err = h.service.create_variable(constant("bucket", &["x"])).await.unwrap_err();
    assert!(matches!(err, HydrateError::DuplicateName { ref name } if name == "bucket"));
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::CreateVariableFailed]);
}

#[tokio::test]
async fn test_update_without_rename() {
    let h = harness(RecordingExecutor::new());

    let mut bucket = h.service.load_variable("v-bucket").await.unwrap();
    bucket.arguments = VariableArguments::Constant {
        values: vec!["archive".to_string()],
    };
    let updated = h.service.update_variable("v-bucket", bucket).await.unwrap();

    assert_eq!(updated.name, "bucket");
    assert_eq!(
        h.service.store().variable("v-bucket").unwrap().variable.unwrap().arguments,
        updated.arguments
    );
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::UpdateVariableSuccess]);
}

#[tokio::test]
async fn test_rename_rejected_while_referenced() {
    let h = harness(RecordingExecutor::new());

    let mut bucket = h.service.load_variable("v-bucket").await.unwrap();
    bucket.name = "source".to_string();
    let err = h.service.update_variable("v-bucket", bucket).await.unwrap_err();

    match err {
        HydrateError::RenameConflict {
            name,
            referrers,
        } => {
            assert_eq!(name, "bucket");
            assert_eq!(referrers, vec!["field", "measurement"]);
        }
        other => panic!("expected a rename conflict, got {other}"),
    }
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::UpdateVariableFailed]);
}

#[tokio::test]
async fn test_rename_of_unreferenced_variable() {
    let h = harness(RecordingExecutor::new());

    let mut host = h.service.load_variable("v-host").await.unwrap();
    host.name = "server".to_string();
    let renamed = h.service.update_variable("v-host", host).await.unwrap();
    assert_eq!(renamed.name, "server");
}

#[tokio::test]
async fn test_delete_clears_selections_everywhere() {
    let h = harness(RecordingExecutor::new());
    h.service.load_variables().await.unwrap();
    h.service.select_value("cell-1", "v-region", "east");
    h.service.select_value("cell-2", "v-region", "west");
    h.service.select_value("cell-2", "v-bucket", "system");

    h.service.delete_variable("v-region").await.unwrap();

    assert!(h.service.store().variable("v-region").is_none());
    assert!(h.service.selections().get("cell-1", "v-region").is_none());
    assert!(h.service.selections().get("cell-2", "v-region").is_none());
    assert_eq!(h.service.selections().get("cell-2", "v-bucket").as_deref(), Some("system"));
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::DeleteVariableSuccess]);
}

#[tokio::test]
async fn test_delete_failure_restores_status() {
    let h = harness(RecordingExecutor::new());
    h.service.load_variables().await.unwrap();
    h.persistence.fail("delete");

    assert!(h.service.delete_variable("v-host").await.is_err());
    let entry = h.service.store().variable("v-host").unwrap();
    assert_eq!(entry.status, RemoteDataState::Done);
    assert!(entry.variable.is_some());
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::DeleteVariableFailed]);
}

#[tokio::test]
async fn test_labels_refetch_variable() {
    let h = harness(RecordingExecutor::new());
    let label = Label {
        id: "l-prod".to_string(),
        name: "production".to_string(),
    };

    let labelled = h.service.add_label("v-bucket", label).await.unwrap();
    assert_eq!(labelled.labels.len(), 1);
    assert_eq!(
        h.service.store().variable("v-bucket").unwrap().variable.unwrap().labels,
        labelled.labels
    );

    let unlabelled = h.service.remove_label("v-bucket", "l-prod").await.unwrap();
    assert!(unlabelled.labels.is_empty());
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_label_failures_notify() {
    let h = harness(RecordingExecutor::new());
    h.persistence.fail("add_label");

    let label = Label {
        id: "l".to_string(),
        name: "l".to_string(),
    };
    assert!(h.service.add_label("v-bucket", label).await.is_err());
    assert!(h.service.remove_label("v-bucket", "missing").await.is_err());
    assert_eq!(
        h.notifier.kinds(),
        vec![NotificationKind::AddLabelFailed, NotificationKind::RemoveLabelFailed]
    );
}

#[tokio::test]
async fn test_refresh_uses_org_variables_and_selections() {
    let executor = RecordingExecutor::new()
        .with_rows("measurements(bucket: \"system\")", ["uptime"])
        .with_rows("fields(bucket: \"system\", measurement: \"uptime\")", ["uptime_format"]);
    let h = harness(executor);
    h.service.load_variables().await.unwrap();
    h.service.select_value("cell", "v-bucket", "system");

    // The cell only shows `field`; `bucket` and `measurement` come from the org
    let field = h.service.store().variable("v-field").unwrap().variable.unwrap();
    let values = h.service.refresh_variable_values("cell", vec![field]).await.unwrap().unwrap();

    assert_eq!(values.len(), 3);
    assert_eq!(values.get("v-field").unwrap().values, vec!["uptime_format"]);
    assert_eq!(h.service.values("cell").unwrap().status, RemoteDataState::Done);
}

#[tokio::test]
async fn test_refresh_with_failing_query_still_commits() {
    let executor = RecordingExecutor::new().with_failure("broken()", "syntax error");
    let h = harness(executor);

    let values = h
        .service
        .refresh_variable_values("cell", vec![Variable::query("x", "broken", "broken()")])
        .await
        .unwrap()
        .unwrap();

    assert!(!values.get("x").unwrap().is_resolved());
    assert_eq!(h.service.values("cell").unwrap().status, RemoteDataState::Done);
    assert!(h.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_export_variable() {
    let h = harness(RecordingExecutor::new());

    let export = h.service.export_variable("v-field").await.unwrap();
    assert_eq!(export.variable.name, "field");
    assert_eq!(export.dependency_names(), vec!["bucket", "measurement"]);

    h.persistence.fail("list");
    assert!(h.service.export_variable("v-field").await.is_err());
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::ExportFailed]);
}
