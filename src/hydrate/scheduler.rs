//! Dependency-ordered hydration of one context's variables.
//!
//! [`hydrate`] walks the reference graph in topological order. Selections short-circuit
//! resolution, map and constant variables resolve from their literals, and query
//! variables are sent to the [`QueryExecutor`] once every upstream value they reference
//! is known. Each result is recorded before any dependent runs, so substitutions always
//! see fresh upstream values.
//!
//! Failure handling:
//! - Cyclic variables are marked [`ValueStatus::Unresolved`](super::ValueStatus) and
//!   left as literal text in referrers (or, with `strict_cycles`, the whole call fails)
//! - A failed query only marks its own variable; dependents become `DependencyFailed`
//! - Cancellation stops the walk and returns [`HydrateError::Cancelled`]

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::executor::{CancellationToken, ExecutionContext, QueryExecutor};
use super::values::{ValueStatus, VariableValues, VariableValuesByID, default_selection};
use crate::core::{ContextId, HydrateError, Variable, VariableArguments};
use crate::export::find_dependents;
use crate::graph::{DependencyGraph, ReferenceSyntax, substitute};
use crate::selection::Selections;

/// Settings shared by every hydration of a service.
#[derive(Debug, Clone, Default)]
pub struct HydrationOptions {
    /// Organization passed to the executor
    pub org_id: String,
    /// Query endpoint passed to the executor
    pub query_url: String,
    /// Placeholder syntax used in query templates
    pub syntax: ReferenceSyntax,
    /// Fail the whole call on a cycle instead of excluding the cyclic variables
    pub strict_cycles: bool,
}

/// One hydration call for one context.
#[derive(Debug, Clone)]
pub struct HydrationRequest {
    /// Context being hydrated
    pub context_id: ContextId,
    /// Variables shown in the context
    pub variables: Vec<Variable>,
    /// Every variable in the organization, used to find referenced variables that the
    /// context does not show itself
    pub all_variables: Vec<Variable>,
    /// Snapshot of the context's selections
    pub selections: Selections,
}

impl HydrationRequest {
    /// Create a request with no organization-wide variables and no selections.
    pub fn new(context_id: impl Into<ContextId>, variables: Vec<Variable>) -> Self {
        Self {
            context_id: context_id.into(),
            variables,
            all_variables: Vec::new(),
            selections: Selections::new(),
        }
    }

    /// Set the organization-wide variable list.
    #[must_use]
    pub fn with_all_variables(mut self, all_variables: Vec<Variable>) -> Self {
        self.all_variables = all_variables;
        self
    }

    /// Set the selection snapshot.
    #[must_use]
    pub fn with_selections(mut self, selections: Selections) -> Self {
        self.selections = selections;
        self
    }
}

/// Resolve every variable of `request` and return their values.
///
/// The result holds an entry for each requested variable and for each organization
/// variable they reference transitively.
///
/// # Errors
///
/// - [`HydrateError::Cancelled`] once `token` fires; no partial values are returned
/// - [`HydrateError::CycleDetected`] on a cycle when `options.strict_cycles` is set
pub async fn hydrate(
    request: &HydrationRequest,
    options: &HydrationOptions,
    executor: &dyn QueryExecutor,
    token: &CancellationToken,
) -> Result<VariableValuesByID, HydrateError> {
    let context_id = request.context_id.as_str();
    ensure_active(token, context_id)?;

    let scope = hydration_scope(&request.variables, &request.all_variables, options.syntax);
    let graph = DependencyGraph::build(&scope, options.syntax);
    let (order, cycle) = graph.acyclic_order();

    info!(
        context_id,
        variables = scope.len(),
        references = graph.edge_count(),
        "hydrating variables"
    );

    let mut values = VariableValuesByID::new();

    if let Some(cycle) = cycle {
        if options.strict_cycles {
            return Err(cycle.into());
        }
        warn!(context_id, cycle = %cycle, "excluding cyclic variables from hydration");
        for node in &cycle.nodes {
            values.insert(node.id.clone(), VariableValues::unresolved());
        }
    }

    let by_id: HashMap<&str, &Variable> = scope.iter().map(|v| (v.id.as_str(), v)).collect();

    for node in order {
        ensure_active(token, context_id)?;

        let Some(&variable) = by_id.get(node.id.as_str()) else {
            continue;
        };

        let resolved = if let Some(selected) = request.selections.get(&variable.id) {
            debug!(context_id, variable_id = %variable.id, "using selection");
            resolve_selection(variable, selected)
        } else {
            match &variable.arguments {
                VariableArguments::Map {
                    values: map,
                } => {
                    let keys: Vec<String> = map.keys().map(str::to_string).collect();
                    let selected = default_selection(&keys);
                    let substitution =
                        selected.as_deref().and_then(|key| map.get(key)).map(str::to_string);
                    VariableValues::resolved(keys, selected, substitution, Vec::new())
                }
                VariableArguments::Constant {
                    values: constants,
                } => {
                    let selected = default_selection(constants);
                    VariableValues::resolved(
                        constants.clone(),
                        selected.clone(),
                        selected,
                        Vec::new(),
                    )
                }
                VariableArguments::Query {
                    query,
                    language,
                } => {
                    let step = QueryStep {
                        variable,
                        query,
                        language: language.as_deref(),
                    };
                    resolve_query(step, &graph, &values, request, options, executor, token)
                        .await?
                }
            }
        };

        values.insert(variable.id.clone(), resolved);
    }

    ensure_active(token, context_id)?;

    info!(
        context_id,
        resolved = values.len() - values.unresolved_ids().len(),
        unresolved = values.unresolved_ids().len(),
        "hydration complete"
    );

    Ok(values)
}

/// The requested variables plus the organization variables they reference transitively.
///
/// Requested definitions win over organization ones with the same id.
fn hydration_scope(
    variables: &[Variable],
    all_variables: &[Variable],
    syntax: ReferenceSyntax,
) -> Vec<Variable> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut scope: Vec<Variable> = Vec::with_capacity(variables.len());

    for variable in variables {
        if seen.insert(variable.id.clone()) {
            scope.push(variable.clone());
        }
    }

    if all_variables.is_empty() {
        return scope;
    }

    // Requested definitions shadow the org copies while following references
    let mut universe: Vec<Variable> = scope.clone();
    universe.extend(all_variables.iter().filter(|v| !seen.contains(&v.id)).cloned());

    for variable in variables {
        for dependency in find_dependents(variable, &universe, syntax) {
            if seen.insert(dependency.id.clone()) {
                scope.push(dependency);
            }
        }
    }

    scope
}

fn resolve_selection(variable: &Variable, selected: &str) -> VariableValues {
    let selected = selected.to_string();
    match &variable.arguments {
        VariableArguments::Map {
            values,
        } => {
            let substitution = values.get(&selected).unwrap_or(&selected).to_string();
            let keys = values.keys().map(str::to_string).collect();
            VariableValues::resolved(keys, Some(selected), Some(substitution), Vec::new())
        }
        VariableArguments::Constant {
            values,
        } => VariableValues::resolved(
            values.clone(),
            Some(selected.clone()),
            Some(selected),
            Vec::new(),
        ),
        VariableArguments::Query {
            ..
        } => VariableValues::resolved(
            vec![selected.clone()],
            Some(selected.clone()),
            Some(selected),
            Vec::new(),
        ),
    }
}

struct QueryStep<'a> {
    variable: &'a Variable,
    query: &'a str,
    language: Option<&'a str>,
}

async fn resolve_query(
    step: QueryStep<'_>,
    graph: &DependencyGraph,
    resolved: &VariableValuesByID,
    request: &HydrationRequest,
    options: &HydrationOptions,
    executor: &dyn QueryExecutor,
    token: &CancellationToken,
) -> Result<VariableValues, HydrateError> {
    let variable = step.variable;
    let mut substitutions: HashMap<String, String> = HashMap::new();
    let mut depends_on = Vec::new();

    for dependency in graph.direct_dependencies(&variable.id) {
        let Some(upstream) = resolved.get(&dependency.id) else {
            continue;
        };

        // Cyclic references stay literal
        if upstream.status == ValueStatus::Unresolved {
            continue;
        }

        depends_on.push(dependency.id.clone());
        match upstream.usable_substitution() {
            Some(value) => {
                substitutions.insert(dependency.name.clone(), value.to_string());
            }
            None => {
                debug!(
                    context_id = %request.context_id,
                    variable_id = %variable.id,
                    dependency = %dependency.id,
                    "dependency has no usable value"
                );
                return Ok(VariableValues::dependency_failed(dependency.id, depends_on));
            }
        }
    }

    let text = substitute(step.query, options.syntax, |name| substitutions.get(name).cloned());
    let ctx = ExecutionContext {
        org_id: options.org_id.clone(),
        query_url: options.query_url.clone(),
        context_id: request.context_id.clone(),
        variable_id: variable.id.clone(),
        language: step.language.map(str::to_string),
        cancellation_token: token.clone(),
    };

    debug!(
        context_id = %request.context_id,
        variable_id = %variable.id,
        query = %text,
        "dispatching variable query"
    );

    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => {
            return Err(HydrateError::Cancelled {
                context_id: request.context_id.clone(),
            });
        }
        result = executor.execute(&text, &ctx) => result,
    };

    match outcome {
        Ok(rows) => {
            let selected = default_selection(&rows);
            Ok(VariableValues::resolved(rows, selected.clone(), selected, depends_on))
        }
        Err(error) => {
            let failure = HydrateError::ExecutionFailed {
                variable_id: variable.id.clone(),
                reason: error.reason.clone(),
            };
            warn!(context_id = %request.context_id, "{failure}");
            Ok(VariableValues::failed(error.reason, depends_on))
        }
    }
}

fn ensure_active(token: &CancellationToken, context_id: &str) -> Result<(), HydrateError> {
    if token.is_cancelled() {
        debug!(context_id, "hydration cancelled");
        return Err(HydrateError::Cancelled {
            context_id: context_id.to_string(),
        });
    }
    Ok(())
}
