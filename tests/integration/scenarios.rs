use varhydrate::core::{HydrateError, Variable};
use varhydrate::graph::{DependencyGraph, ReferenceSyntax};
use varhydrate::hydrate::{
    CancellationToken, HydrationOptions, HydrationRequest, ValueStatus, hydrate,
};
use varhydrate::selection::Selections;
use varhydrate::test_utils::{RecordingExecutor, init_test_logging, org_variables};

fn options() -> HydrationOptions {
    HydrationOptions {
        org_id: "org".to_string(),
        ..HydrationOptions::default()
    }
}

/// A constant feeding a query resolves first and is substituted by its first value
#[tokio::test]
async fn test_constant_then_query() {
    init_test_logging(None);

    let variables = vec![
        Variable::query("x", "X", "from(name: $(Y))"),
        Variable::constant("y", "Y", ["prod", "staging"]),
    ];

    let graph = DependencyGraph::build(&variables, ReferenceSyntax::Dollar);
    let order: Vec<String> =
        graph.topological_order().unwrap().into_iter().map(|n| n.name).collect();
    assert_eq!(order, vec!["Y", "X"]);

    let executor = RecordingExecutor::new().with_rows("from(name: prod)", ["a", "b"]);
    let values = hydrate(
        &HydrationRequest::new("cell", variables),
        &options(),
        &executor,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(values.get("y").unwrap().values, vec!["prod", "staging"]);
    assert_eq!(values.get("y").unwrap().selected.as_deref(), Some("prod"));
    assert_eq!(values.get("x").unwrap().values, vec!["a", "b"]);
    assert_eq!(executor.dispatched(), vec!["from(name: prod)"]);
}

/// Mutually referencing variables stay unresolved and nothing is dispatched
#[tokio::test]
async fn test_two_node_cycle() {
    let variables =
        vec![Variable::query("a", "A", "q($(B))"), Variable::query("b", "B", "q($(A))")];

    let graph = DependencyGraph::build(&variables, ReferenceSyntax::Dollar);
    let cycle = graph.topological_order().unwrap_err();
    assert_eq!(cycle.names(), vec!["A", "B"]);

    let executor = RecordingExecutor::new();
    let values = hydrate(
        &HydrationRequest::new("cell", variables),
        &options(),
        &executor,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(values.get("a").unwrap().status, ValueStatus::Unresolved);
    assert_eq!(values.get("b").unwrap().status, ValueStatus::Unresolved);
    assert!(executor.dispatched().is_empty());
}

/// A self reference is a cycle of one
#[tokio::test]
async fn test_self_reference() {
    let variables = vec![
        Variable::query("s", "self", "q($(self))"),
        Variable::constant("c", "c", ["1"]),
    ];
    let values = hydrate(
        &HydrationRequest::new("cell", variables),
        &options(),
        &RecordingExecutor::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(values.get("s").unwrap().status, ValueStatus::Unresolved);
    assert!(values.get("c").unwrap().is_resolved());
}

/// Strict mode turns the same cycle into an error
#[tokio::test]
async fn test_strict_cycles() {
    let variables =
        vec![Variable::query("a", "A", "q($(B))"), Variable::query("b", "B", "q($(A))")];
    let options = HydrationOptions {
        strict_cycles: true,
        ..options()
    };

    let err = hydrate(
        &HydrationRequest::new("cell", variables),
        &options,
        &RecordingExecutor::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        HydrateError::CycleDetected(cycle) => assert_eq!(cycle.names(), vec!["A", "B"]),
        other => panic!("expected a cycle, got {other}"),
    }
}

/// Selections win over computed values and flow into dependents
#[tokio::test]
async fn test_selection_precedence() {
    let executor = RecordingExecutor::new()
        .with_rows("measurements(bucket: \"system\")", ["uptime"])
        .with_rows("fields(bucket: \"system\", measurement: \"uptime\")", ["uptime_format"])
        .with_rows("hosts(region: \"us-east-1\")", ["db-1"]);

    let selections = Selections::from([
        ("v-bucket".to_string(), "system".to_string()),
        ("v-region".to_string(), "east".to_string()),
    ]);
    let request = HydrationRequest::new("cell", org_variables()).with_selections(selections);

    let values = hydrate(&request, &options(), &executor, &CancellationToken::new()).await.unwrap();

    assert_eq!(values.get("v-bucket").unwrap().selected.as_deref(), Some("system"));
    assert_eq!(values.get("v-measurement").unwrap().values, vec!["uptime"]);
    assert_eq!(values.get("v-field").unwrap().values, vec!["uptime_format"]);
    assert_eq!(values.get("v-host").unwrap().values, vec!["db-1"]);
    assert_eq!(
        values.get("v-field").unwrap().depends_on,
        vec!["v-bucket".to_string(), "v-measurement".to_string()]
    );
}

/// A selected query variable is never dispatched
#[tokio::test]
async fn test_selected_query_is_not_dispatched() {
    let executor = RecordingExecutor::new()
        .with_rows("fields(bucket: \"telegraf\", measurement: \"disk\")", ["free"])
        .with_rows("hosts(region: \"us-west-2\")", ["web-1"]);
    let request = HydrationRequest::new("cell", org_variables())
        .with_selections(Selections::from([("v-measurement".to_string(), "disk".to_string())]));

    let values = hydrate(&request, &options(), &executor, &CancellationToken::new()).await.unwrap();

    assert_eq!(values.get("v-measurement").unwrap().values, vec!["disk"]);
    assert!(!executor.dispatched().iter().any(|q| q.starts_with("measurements")));
}

/// Identical inputs yield identical outputs
#[tokio::test]
async fn test_idempotent() {
    let executor = RecordingExecutor::new()
        .with_rows("measurements(bucket: \"telegraf\")", ["cpu", "mem"])
        .with_rows("fields(bucket: \"telegraf\", measurement: \"cpu\")", ["usage"])
        .with_rows("hosts(region: \"us-west-2\")", ["web-1"]);
    let request = HydrationRequest::new("cell", org_variables());

    let first = hydrate(&request, &options(), &executor, &CancellationToken::new()).await.unwrap();
    let second = hydrate(&request, &options(), &executor, &CancellationToken::new()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(executor.dispatched().len(), 6);
}

/// Flux-style references resolve the same way
#[tokio::test]
async fn test_flux_syntax() {
    let variables = vec![
        Variable::constant("b", "bucket", ["telegraf"]),
        Variable::query("m", "measurement", "from(bucket: v.bucket) |> measurements()"),
    ];
    let options = HydrationOptions {
        syntax: ReferenceSyntax::Flux,
        ..options()
    };
    let executor =
        RecordingExecutor::new().with_rows("from(bucket: telegraf) |> measurements()", ["cpu"]);

    let values = hydrate(
        &HydrationRequest::new("cell", variables),
        &options,
        &executor,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(values.get("m").unwrap().values, vec!["cpu"]);
}
