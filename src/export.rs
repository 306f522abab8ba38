//! Export support: the variables a variable depends on.
//!
//! Exporting a query variable is only useful together with every variable its query
//! reaches, directly or through other queries. [`find_dependents`] computes that closure
//! over the whole organization and [`VariableExport`] bundles it for the template
//! formatter.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::Variable;
use crate::graph::{ReferenceSyntax, referenced_names};

/// Every variable reachable from `variable` by following query references.
///
/// The search runs over `all_variables` (the organization's full set), never revisits a
/// variable, and so terminates on cyclic references. `variable` itself is not part of
/// the result even when a cycle leads back to it. Output is sorted by name.
#[must_use]
pub fn find_dependents(
    variable: &Variable,
    all_variables: &[Variable],
    syntax: ReferenceSyntax,
) -> Vec<Variable> {
    let mut by_name: HashMap<&str, &Variable> = HashMap::new();
    for candidate in all_variables {
        by_name.entry(candidate.name.as_str()).or_insert(candidate);
    }

    let mut visited: HashSet<&str> = HashSet::from([variable.id.as_str()]);
    let mut queue: VecDeque<&Variable> = VecDeque::from([variable]);
    let mut dependents: Vec<Variable> = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(query) = current.arguments.query_text() else {
            continue;
        };

        for name in referenced_names(query, syntax) {
            if let Some(&dependency) = by_name.get(name.as_str())
                && visited.insert(dependency.id.as_str())
            {
                dependents.push(dependency.clone());
                queue.push_back(dependency);
            }
        }
    }

    dependents.sort_by(|a, b| a.name.cmp(&b.name));
    dependents
}

/// A variable together with everything it depends on, ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableExport {
    /// The exported variable
    pub variable: Variable,
    /// Transitive dependencies, sorted by name
    pub dependencies: Vec<Variable>,
}

impl VariableExport {
    /// Collect `variable` and its dependencies from `all_variables`.
    #[must_use]
    pub fn new(variable: Variable, all_variables: &[Variable], syntax: ReferenceSyntax) -> Self {
        let dependencies = find_dependents(&variable, all_variables, syntax);
        Self {
            variable,
            dependencies,
        }
    }

    /// Names of the dependencies.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies.iter().map(|v| v.name.as_str()).collect()
    }
}
