//! Per-context user selections.
//!
//! A selection pins one variable to a user-chosen value inside one context and takes
//! precedence over computed resolution. Selections live until the context is torn down
//! or the variable is deleted.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::{ContextId, VariableId};

/// Selections of one context, keyed by variable id.
///
/// The scheduler receives this as an owned snapshot and never writes back.
pub type Selections = HashMap<VariableId, String>;

/// Concurrent `(context, variable) → value` overlay.
#[derive(Debug, Clone, Default)]
pub struct SelectionOverlay {
    /// Key: context id
    /// Value: that context's selections
    contexts: Arc<DashMap<ContextId, Selections>>,
}

impl SelectionOverlay {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the selection for `variable_id` in `context_id`.
    ///
    /// Returns the previous selection, if any.
    pub fn select(
        &self,
        context_id: &str,
        variable_id: &str,
        value: impl Into<String>,
    ) -> Option<String> {
        let value = value.into();
        debug!(context_id, variable_id, value = %value, "selecting value");
        self.contexts
            .entry(context_id.to_string())
            .or_default()
            .insert(variable_id.to_string(), value)
    }

    /// The selection for `variable_id` in `context_id`.
    #[must_use]
    pub fn get(&self, context_id: &str, variable_id: &str) -> Option<String> {
        self.contexts.get(context_id).and_then(|selections| selections.get(variable_id).cloned())
    }

    /// Copy of every selection in `context_id`.
    #[must_use]
    pub fn snapshot(&self, context_id: &str) -> Selections {
        self.contexts.get(context_id).map(|selections| selections.clone()).unwrap_or_default()
    }

    /// Drop every selection of `context_id`.
    pub fn clear_context(&self, context_id: &str) {
        if self.contexts.remove(context_id).is_some() {
            debug!(context_id, "cleared selections");
        }
    }

    /// Drop `variable_id` from every context.
    ///
    /// Returns the number of contexts that had a selection for it.
    pub fn remove_variable(&self, variable_id: &str) -> usize {
        let mut removed = 0;
        for mut selections in self.contexts.iter_mut() {
            if selections.remove(variable_id).is_some() {
                removed += 1;
            }
        }
        self.contexts.retain(|_, selections| !selections.is_empty());
        removed
    }

    /// Number of contexts with at least one selection.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }
}
