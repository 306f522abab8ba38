use std::sync::Arc;

use futures::future::join_all;
use varhydrate::core::Variable;
use varhydrate::hydrate::{
    CancellationToken, HydrationOptions, HydrationRequest, VariableValues, VariableValuesByID, hydrate,
};
use varhydrate::persistence::InMemoryPersistence;
use varhydrate::registry::CancellationRegistry;
use varhydrate::service::VariableService;
use varhydrate::store::RemoteDataState;
use varhydrate::test_utils::{GatedExecutor, MemoryNotifier, RecordingExecutor};

fn service(executor: GatedExecutor, notifier: MemoryNotifier) -> VariableService {
    VariableService::new(
        HydrationOptions::default(),
        Arc::new(InMemoryPersistence::new()),
        Arc::new(executor),
        Arc::new(notifier),
    )
}

/// A refresh started while another is in flight wins, and the older one is dropped
#[tokio::test]
async fn test_newer_refresh_supersedes_older() {
    let executor = GatedExecutor::new(["stale"], ["fresh"]);
    let notifier = MemoryNotifier::new();
    let service = service(executor.clone(), notifier.clone());
    let variables = vec![Variable::query("q", "rows", "rows()")];

    let first = tokio::spawn({
        let service = service.clone();
        let variables = variables.clone();
        async move { service.refresh_variable_values("cell", variables).await }
    });
    executor.wait_started().await;

    let second = service.refresh_variable_values("cell", variables).await.unwrap().unwrap();
    assert_eq!(second.get("q").unwrap().values, vec!["fresh"]);

    executor.release();
    let first = first.await.unwrap().unwrap();
    assert!(first.is_none());

    let stored = service.values("cell").unwrap();
    assert_eq!(stored.status, RemoteDataState::Done);
    assert_eq!(stored.values.unwrap().get("q").unwrap().values, vec!["fresh"]);
    assert!(notifier.notifications().is_empty());
    assert_eq!(executor.calls(), 2);
}

/// Results of a job that finishes after being superseded never reach the store
#[tokio::test]
async fn test_late_result_of_superseded_job_is_discarded() {
    let registry = CancellationRegistry::new();
    let executor = RecordingExecutor::new().with_rows("rows()", ["value"]);
    let request = HydrationRequest::new("cell", vec![Variable::query("q", "rows", "rows()")]);

    let job_a = registry.start("cell");
    let job_b = registry.start("cell");

    // B completes first
    let values_b =
        hydrate(&request, &HydrationOptions::default(), &executor, &job_b.token).await.unwrap();
    let mut stored = Vec::new();
    assert!(registry.commit(&job_b, || stored.push(("b", values_b.clone()))).is_some());

    // A's backend ignored the cancellation and finishes later
    let values_a = hydrate(
        &request,
        &HydrationOptions::default(),
        &executor,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(registry.commit(&job_a, || stored.push(("a", values_a))).is_none());

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, "b");
}

/// A cancelled token stops the scheduler before any dispatch
#[tokio::test]
async fn test_cancelled_before_dispatch() {
    let registry = CancellationRegistry::new();
    let executor = RecordingExecutor::new().with_rows("rows()", ["value"]);
    let job = registry.start("cell");
    registry.cancel("cell");

    let err = hydrate(
        &HydrationRequest::new("cell", vec![Variable::query("q", "rows", "rows()")]),
        &HydrationOptions::default(),
        &executor,
        &job.token,
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(executor.dispatched().is_empty());
}

/// Tearing down a context mid-flight drops its refresh silently
#[tokio::test]
async fn test_teardown_during_refresh() {
    let executor = GatedExecutor::new(["stale"], ["fresh"]);
    let notifier = MemoryNotifier::new();
    let service = service(executor.clone(), notifier.clone());

    let pending = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .refresh_variable_values("cell", vec![Variable::query("q", "rows", "rows()")])
                .await
        }
    });
    executor.wait_started().await;

    service.teardown_context("cell");
    executor.release();

    assert!(pending.await.unwrap().unwrap().is_none());
    assert!(service.values("cell").is_none());
    assert!(notifier.notifications().is_empty());
}

/// Contexts hydrate concurrently without affecting each other
#[tokio::test]
async fn test_independent_contexts() {
    let executor = RecordingExecutor::new()
        .with_rows("m(telegraf)", ["cpu"])
        .with_rows("m(system)", ["uptime"]);
    let service = VariableService::new(
        HydrationOptions::default(),
        Arc::new(InMemoryPersistence::new()),
        Arc::new(executor),
        Arc::new(MemoryNotifier::new()),
    );
    let variables = vec![
        Variable::constant("b", "bucket", ["telegraf", "system"]),
        Variable::query("m", "measurement", "m($(bucket))"),
    ];

    for i in 0..8 {
        if i % 2 == 1 {
            service.select_value(&format!("cell-{i}"), "b", "system");
        }
    }

    let refreshes = (0..8).map(|i| {
        let service = service.clone();
        let variables = variables.clone();
        async move { service.refresh_variable_values(&format!("cell-{i}"), variables).await }
    });
    let results = join_all(refreshes).await;

    for (i, result) in results.into_iter().enumerate() {
        let values = result.unwrap().unwrap();
        let expected = if i % 2 == 1 { "uptime" } else { "cpu" };
        assert_eq!(values.get("m").unwrap().values, vec![expected]);
    }
    assert_eq!(service.registry().active_count(), 0);
}

/// Cancelling the running refresh in place puts back the state it replaced
#[tokio::test]
async fn test_cancel_in_place_restores_previous_state() {
    let executor = GatedExecutor::new(["never"], ["unused"]);
    let notifier = MemoryNotifier::new();
    let service = service(executor.clone(), notifier.clone());
    let variables = vec![Variable::query("q", "rows", "rows()")];

    let mut committed = VariableValuesByID::new();
    committed.insert("q", VariableValues::resolved(vec!["old".to_string()], None, None, Vec::new()));
    service.store().set_values("cell", RemoteDataState::Done, Some(committed.clone()));

    let refresh = tokio::spawn({
        let service = service.clone();
        let variables = variables.clone();
        async move { service.refresh_variable_values("cell", variables).await }
    });
    executor.wait_started().await;
    assert_eq!(service.values("cell").unwrap().status, RemoteDataState::Loading);

    assert!(service.registry().cancel("cell"));
    assert!(refresh.await.unwrap().unwrap().is_none());

    let stored = service.values("cell").unwrap();
    assert_eq!(stored.status, RemoteDataState::Done);
    assert_eq!(stored.values, Some(committed));
    assert_eq!(service.registry().active_count(), 0);
    assert!(notifier.notifications().is_empty());
}

/// A context cancelled during its first refresh goes back to having no state
#[tokio::test]
async fn test_cancel_first_refresh_leaves_no_state() {
    let executor = GatedExecutor::new(["never"], ["unused"]);
    let service = service(executor.clone(), MemoryNotifier::new());

    let refresh = tokio::spawn({
        let service = service.clone();
        async move {
            service.refresh_variable_values("cell", vec![Variable::query("q", "rows", "rows()")]).await
        }
    });
    executor.wait_started().await;

    service.registry().cancel("cell");
    assert!(refresh.await.unwrap().unwrap().is_none());
    assert!(service.values("cell").is_none());
}
