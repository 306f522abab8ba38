//! Dependency graph between variables.
//!
//! An edge `A → B` means A's query template references B by name, so B must resolve
//! before A. The graph provides a deterministic topological order (ties broken by the
//! smallest name) and reports cycles as an explicit [`CycleDetected`] value so callers
//! choose the recovery policy.

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use super::references::{ReferenceSyntax, referenced_names};
use crate::core::{Variable, VariableId};

/// A variable as seen by the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableNode {
    /// Variable id
    pub id: VariableId,
    /// Variable name, used for ordering tie-breaks
    pub name: String,
}

impl fmt::Display for VariableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A reference edge: `from`'s query references `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceEdge {
    /// Referring variable
    pub from: VariableId,
    /// Referenced variable
    pub to: VariableId,
}

/// The set of variables that take part in a reference cycle.
///
/// Holds exactly the members of strongly connected components with more than one
/// node, plus self-referencing nodes, sorted by name. Variables that only depend on a
/// cycle are not members.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Circular variable reference detected: {}", self.names().join(", "))]
pub struct CycleDetected {
    /// Cyclic variables sorted by name
    pub nodes: Vec<VariableNode>,
}

impl CycleDetected {
    /// Whether `id` is part of the cycle.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Names of the cyclic variables.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Ids of the cyclic variables.
    #[must_use]
    pub fn ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

/// Reference graph over one set of variables.
pub struct DependencyGraph {
    /// The underlying directed graph.
    graph: DiGraph<VariableNode, ()>,
    /// Map from variable ids to their graph indices.
    node_map: HashMap<VariableId, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Build the graph for `variables`.
    ///
    /// Every variable becomes a node. Query variables get an edge to each variable in
    /// the set whose name their template references; names outside the set are
    /// ignored. Map and constant variables have no outgoing edges.
    pub fn build(variables: &[Variable], syntax: ReferenceSyntax) -> Self {
        let mut graph = Self::new();
        let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();

        for variable in variables {
            let index = graph.ensure_node(VariableNode {
                id: variable.id.clone(),
                name: variable.name.clone(),
            });
            by_name.entry(variable.name.as_str()).or_insert(index);
        }

        for variable in variables {
            let Some(query) = variable.arguments.query_text() else {
                continue;
            };
            let from = graph.node_map[&variable.id];

            for name in referenced_names(query, syntax) {
                if let Some(&to) = by_name.get(name.as_str()) {
                    graph.add_reference(from, to);
                }
            }
        }

        graph
    }

    /// Add a node to the graph if it doesn't already exist.
    fn ensure_node(&mut self, node: VariableNode) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&node.id) {
            index
        } else {
            let id = node.id.clone();
            let index = self.graph.add_node(node);
            self.node_map.insert(id, index);
            index
        }
    }

    fn add_reference(&mut self, from: NodeIndex, to: NodeIndex) {
        // A template may mention the same name several times
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Find the variables that take part in a cycle, if any.
    #[must_use]
    pub fn detect_cycles(&self) -> Option<CycleDetected> {
        let mut nodes: Vec<VariableNode> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .flatten()
            .map(|idx| self.graph[idx].clone())
            .collect();

        if nodes.is_empty() {
            return None;
        }

        nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Some(CycleDetected {
            nodes,
        })
    }

    /// Order variables so every variable comes after the variables it references.
    ///
    /// Among variables whose references are all satisfied, the smallest name goes first.
    pub fn topological_order(&self) -> Result<Vec<VariableNode>, CycleDetected> {
        let order = self.ordered_without(&HashSet::new());

        if order.len() == self.graph.node_count() {
            return Ok(order);
        }

        Err(self.detect_cycles().unwrap_or(CycleDetected {
            nodes: Vec::new(),
        }))
    }

    /// Order every non-cyclic variable, treating references to cyclic ones as absent.
    ///
    /// Returns the order together with the cycle that was excluded, if any.
    #[must_use]
    pub fn acyclic_order(&self) -> (Vec<VariableNode>, Option<CycleDetected>) {
        let cycle = self.detect_cycles();
        let excluded: HashSet<NodeIndex> = cycle
            .as_ref()
            .map(|c| c.nodes.iter().filter_map(|n| self.node_map.get(&n.id).copied()).collect())
            .unwrap_or_default();

        (self.ordered_without(&excluded), cycle)
    }

    /// Kahn's algorithm with a name-ordered ready set.
    fn ordered_without(&self, excluded: &HashSet<NodeIndex>) -> Vec<VariableNode> {
        let mut remaining: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ready: BTreeSet<(&str, &str, NodeIndex)> = BTreeSet::new();

        for idx in self.graph.node_indices() {
            if excluded.contains(&idx) {
                continue;
            }
            let pending = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .filter(|dep| !excluded.contains(dep))
                .count();
            if pending == 0 {
                let node = &self.graph[idx];
                ready.insert((node.name.as_str(), node.id.as_str(), idx));
            } else {
                remaining.insert(idx, pending);
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((_, _, idx)) = ready.pop_first() {
            order.push(self.graph[idx].clone());

            for dependent in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if let Some(count) = remaining.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        remaining.remove(&dependent);
                        let node = &self.graph[dependent];
                        ready.insert((node.name.as_str(), node.id.as_str(), dependent));
                    }
                }
            }
        }

        order
    }

    /// Variables that `id` references directly, sorted by name.
    #[must_use]
    pub fn direct_dependencies(&self, id: &str) -> Vec<VariableNode> {
        let Some(&idx) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<VariableNode> =
            self.graph.neighbors(idx).map(|dep| self.graph[dep].clone()).collect();
        deps.sort_by(|a, b| a.name.cmp(&b.name));
        deps
    }

    /// All reference edges, sorted by (from, to).
    #[must_use]
    pub fn edges(&self) -> Vec<ReferenceEdge> {
        let mut edges: Vec<ReferenceEdge> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| ReferenceEdge {
                from: self.graph[from].id.clone(),
                to: self.graph[to].id.clone(),
            })
            .collect();
        edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
        edges
    }

    /// Whether the graph has a node for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the total number of reference edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Render the references reachable from `root` as a tree.
    ///
    /// Nodes already printed on the current path are marked as circular and not expanded.
    pub fn to_tree_string(&self, root: &str) -> String {
        let mut result = String::new();
        let Some(&idx) = self.node_map.get(root) else {
            return result;
        };
        let mut visited = HashSet::new();
        self.build_tree_string(idx, &mut result, "", true, &mut visited);
        result
    }

    fn build_tree_string(
        &self,
        idx: NodeIndex,
        result: &mut String,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last {
            "└── "
        } else {
            "├── "
        };
        result.push_str(&format!("{}{}{}\n", prefix, connector, self.graph[idx]));

        let child_prefix = if is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };

        if !visited.insert(idx) {
            result.push_str(&format!("{child_prefix}└── (circular reference)\n"));
            return;
        }

        let deps = self.direct_dependencies(&self.graph[idx].id);
        for (i, dep) in deps.iter().enumerate() {
            let is_last_child = i == deps.len() - 1;
            let dep_idx = self.node_map[&dep.id];
            self.build_tree_string(dep_idx, result, &child_prefix, is_last_child, visited);
        }

        visited.remove(&idx);
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
