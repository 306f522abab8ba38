//! Canonical variable definitions and last-known per-context values.
//!
//! The store is written by the service layer only. Hydration results reach it through
//! [`CancellationRegistry::commit`](crate::registry::CancellationRegistry::commit), so a
//! superseded job never overwrites newer values.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::core::{ContextId, Variable, VariableId};
use crate::hydrate::VariableValuesByID;

/// Progress of a remote fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteDataState {
    /// Nothing requested yet
    #[default]
    NotStarted,
    /// Request in flight
    Loading,
    /// Data available
    Done,
    /// Last request failed
    Error,
}

impl RemoteDataState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Loading => 1,
            Self::Done => 2,
            Self::Error => 3,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Loading,
            2 => Self::Done,
            3 => Self::Error,
            _ => Self::NotStarted,
        }
    }
}

impl fmt::Display for RemoteDataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Loading => write!(f, "loading"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A stored variable and the state of its last fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub status: RemoteDataState,
    /// Last successfully fetched definition
    pub variable: Option<Variable>,
}

/// Last-known values of one context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextValues {
    pub status: RemoteDataState,
    /// Values of the last committed hydration
    pub values: Option<VariableValuesByID>,
}

/// Concurrent store of variables and per-context values.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    list_status: Arc<AtomicU8>,
    variables: Arc<DashMap<VariableId, VariableEntry>>,
    values: Arc<DashMap<ContextId, ContextValues>>,
}

impl VariableStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of the variable list fetch.
    #[must_use]
    pub fn list_status(&self) -> RemoteDataState {
        RemoteDataState::from_u8(self.list_status.load(Ordering::SeqCst))
    }

    /// Record a variable list fetch.
    ///
    /// With `Some(variables)` the stored set is replaced by the given one.
    pub fn set_variables(&self, status: RemoteDataState, variables: Option<Vec<Variable>>) {
        if let Some(variables) = variables {
            self.variables.clear();
            for variable in variables {
                self.variables.insert(
                    variable.id.clone(),
                    VariableEntry {
                        status,
                        variable: Some(variable),
                    },
                );
            }
        }
        self.list_status.store(status.as_u8(), Ordering::SeqCst);
    }

    /// Record a single variable fetch.
    ///
    /// Without a definition the previously stored one is kept.
    pub fn set_variable(&self, id: &str, status: RemoteDataState, variable: Option<Variable>) {
        let mut entry = self.variables.entry(id.to_string()).or_insert_with(|| VariableEntry {
            status,
            variable: None,
        });
        entry.status = status;
        if let Some(variable) = variable {
            entry.variable = Some(variable);
        }
    }

    /// Remove a variable and its values in every context.
    pub fn remove_variable(&self, id: &str) {
        self.variables.remove(id);
        for mut context in self.values.iter_mut() {
            if let Some(values) = context.values.as_mut() {
                values.remove(id);
            }
        }
    }

    /// Entry for `id`.
    #[must_use]
    pub fn variable(&self, id: &str) -> Option<VariableEntry> {
        self.variables.get(id).map(|entry| entry.clone())
    }

    /// Every stored definition, sorted by name.
    #[must_use]
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables: Vec<Variable> =
            self.variables.iter().filter_map(|entry| entry.variable.clone()).collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        variables
    }

    /// Record a hydration state for `context_id`.
    ///
    /// With `Some(values)` the context's values are replaced; otherwise the previous
    /// values stay visible while the new state is recorded.
    pub fn set_values(
        &self,
        context_id: &str,
        status: RemoteDataState,
        values: Option<VariableValuesByID>,
    ) {
        let mut context = self.values.entry(context_id.to_string()).or_default();
        context.status = status;
        if let Some(values) = values {
            context.values = Some(values);
        }
    }

    /// Last-known values of `context_id`.
    #[must_use]
    pub fn values(&self, context_id: &str) -> Option<ContextValues> {
        self.values.get(context_id).map(|context| context.clone())
    }

    /// Forget everything about `context_id`.
    pub fn remove_context(&self, context_id: &str) {
        self.values.remove(context_id);
    }
}
