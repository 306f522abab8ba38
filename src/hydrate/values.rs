//! Resolved values produced by hydration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::VariableId;

/// Outcome of resolving one variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValueStatus {
    /// Values were computed or taken from a selection
    Resolved,
    /// Excluded because the variable is part of a reference cycle
    Unresolved,
    /// The variable's own query failed
    Failed {
        /// Reason reported by the executor
        reason: String,
    },
    /// A referenced variable failed or produced no value, so the query was not sent
    DependencyFailed {
        /// Id of the first upstream variable that could not be substituted
        dependency: VariableId,
    },
}

/// Values for one variable in one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableValues {
    /// Options a picker offers (query results, map keys, constant values)
    pub values: Vec<String>,
    /// The active option
    pub selected: Option<String>,
    /// Text substituted into dependent queries; for map variables this is the literal
    /// the selected key maps to
    pub substitution: Option<String>,
    /// Ids of the referenced variables whose values were consulted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<VariableId>,
    /// Resolution outcome
    pub status: ValueStatus,
}

impl VariableValues {
    /// A successfully resolved variable.
    #[must_use]
    pub fn resolved(
        values: Vec<String>,
        selected: Option<String>,
        substitution: Option<String>,
        depends_on: Vec<VariableId>,
    ) -> Self {
        Self {
            values,
            selected,
            substitution,
            depends_on,
            status: ValueStatus::Resolved,
        }
    }

    /// A variable excluded by a reference cycle.
    #[must_use]
    pub fn unresolved() -> Self {
        Self::empty(ValueStatus::Unresolved, Vec::new())
    }

    /// A variable whose own query failed.
    #[must_use]
    pub fn failed(reason: impl Into<String>, depends_on: Vec<VariableId>) -> Self {
        Self::empty(
            ValueStatus::Failed {
                reason: reason.into(),
            },
            depends_on,
        )
    }

    /// A variable that could not run because `dependency` has no usable value.
    #[must_use]
    pub fn dependency_failed(dependency: impl Into<String>, depends_on: Vec<VariableId>) -> Self {
        Self::empty(
            ValueStatus::DependencyFailed {
                dependency: dependency.into(),
            },
            depends_on,
        )
    }

    fn empty(status: ValueStatus, depends_on: Vec<VariableId>) -> Self {
        Self {
            values: Vec::new(),
            selected: None,
            substitution: None,
            depends_on,
            status,
        }
    }

    /// Whether the variable resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status == ValueStatus::Resolved
    }

    /// The value dependents may substitute, if any.
    ///
    /// Only resolved variables with a substitution qualify.
    #[must_use]
    pub fn usable_substitution(&self) -> Option<&str> {
        if self.is_resolved() {
            self.substitution.as_deref()
        } else {
            None
        }
    }
}

/// Default selection rule for variables without a user selection: the first option.
///
/// Map variables apply this to their keys, constant variables to their values and
/// query variables to their result rows. An empty option list selects nothing.
#[must_use]
pub fn default_selection(options: &[String]) -> Option<String> {
    options.first().cloned()
}

/// All resolved values for one context, keyed by variable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableValuesByID {
    by_id: BTreeMap<VariableId, VariableValues>,
}

impl VariableValuesByID {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the values for `id`, replacing earlier ones.
    pub fn insert(&mut self, id: impl Into<VariableId>, values: VariableValues) {
        self.by_id.insert(id.into(), values);
    }

    /// Drop the values for `id`.
    pub fn remove(&mut self, id: &str) -> Option<VariableValues> {
        self.by_id.remove(id)
    }

    /// Values for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VariableValues> {
        self.by_id.get(id)
    }

    /// Whether values exist for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&VariableId, &VariableValues)> {
        self.by_id.iter()
    }

    /// Number of variables with values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Ids whose status is not [`ValueStatus::Resolved`].
    #[must_use]
    pub fn unresolved_ids(&self) -> Vec<&str> {
        self.by_id.iter().filter(|(_, v)| !v.is_resolved()).map(|(id, _)| id.as_str()).collect()
    }
}
