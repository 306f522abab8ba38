//! Property-based tests for ordering and cycle exclusion over generated graphs.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use varhydrate::core::Variable;
use varhydrate::graph::{DependencyGraph, ReferenceSyntax};
use varhydrate::hydrate::{
    CancellationToken, HydrationOptions, HydrationRequest, ValueStatus, hydrate,
};
use varhydrate::test_utils::RecordingExecutor;

/// Reference lists: `references[i]` holds the variables `v{i}` references.
type References = Vec<BTreeSet<usize>>;

/// Random DAG where variable `i` only references variables with a lower index.
fn dag() -> impl Strategy<Value = References> {
    (2usize..12).prop_flat_map(|n| {
        prop::collection::vec((1..n, any::<prop::sample::Index>()), 0..n * 2).prop_map(
            move |pairs| {
                let mut references = vec![BTreeSet::new(); n];
                for (from, to) in pairs {
                    references[from].insert(to.index(from));
                }
                references
            },
        )
    })
}

fn variables(references: &References) -> Vec<Variable> {
    references
        .iter()
        .enumerate()
        .map(|(i, targets)| {
            if targets.is_empty() {
                Variable::constant(format!("id-{i}"), format!("v{i}"), ["c"])
            } else {
                let args: Vec<String> = targets.iter().map(|t| format!("$(v{t})")).collect();
                Variable::query(format!("id-{i}"), format!("v{i}"), format!("q({})", args.join(",")))
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every referenced variable comes before its referrer
    #[test]
    fn prop_acyclic_order_is_linearization(references in dag()) {
        let variables = variables(&references);
        let graph = DependencyGraph::build(&variables, ReferenceSyntax::Dollar);

        prop_assert!(graph.detect_cycles().is_none());
        let order = graph.topological_order().unwrap();
        prop_assert_eq!(order.len(), variables.len());

        let position: HashMap<String, usize> =
            order.into_iter().enumerate().map(|(i, node)| (node.id, i)).collect();
        for edge in graph.edges() {
            prop_assert!(position[&edge.to] < position[&edge.from]);
        }
    }

    /// A back edge leaves exactly the cycle members unresolved and the rest ordered
    #[test]
    fn prop_back_edge_excludes_only_cycle(
        mut references in dag(),
        pick in any::<prop::sample::Index>(),
    ) {
        let edges: Vec<(usize, usize)> = references
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| targets.iter().map(move |&to| (from, to)))
            .collect();
        let (from, to) = if edges.is_empty() {
            references[1].insert(0);
            (1, 0)
        } else {
            edges[pick.index(edges.len())]
        };
        references[to].insert(from);

        let variables = variables(&references);
        let n = variables.len();
        let graph = DependencyGraph::build(&variables, ReferenceSyntax::Dollar);

        let (order, cycle) = graph.acyclic_order();
        let cycle = cycle.unwrap();
        let from_id = format!("id-{from}");
        let to_id = format!("id-{to}");
        prop_assert!(cycle.contains(&from_id));
        prop_assert!(cycle.contains(&to_id));
        prop_assert_eq!(order.len() + cycle.nodes.len(), n);
        prop_assert!(order.iter().all(|node| !cycle.contains(&node.id)));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let values = runtime
            .block_on(hydrate(
                &HydrationRequest::new("cell", variables.clone()),
                &HydrationOptions::default(),
                &RecordingExecutor::new(),
                &CancellationToken::new(),
            ))
            .unwrap();

        prop_assert_eq!(values.len(), n);
        for variable in &variables {
            let unresolved = values.get(&variable.id).unwrap().status == ValueStatus::Unresolved;
            prop_assert_eq!(unresolved, cycle.contains(&variable.id));
        }
    }
}
