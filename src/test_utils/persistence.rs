//! Persistence double with injectable failures.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::{Label, NewVariable, Variable};
use crate::persistence::{InMemoryPersistence, PersistenceError, VariablePersistence};

/// [`InMemoryPersistence`] that fails the operations named with [`fail`](Self::fail).
///
/// Operation names match the trait methods: `list`, `get`, `create`, `update`,
/// `delete`, `add_label`, `remove_label`.
#[derive(Debug, Clone, Default)]
pub struct FlakyPersistence {
    inner: InMemoryPersistence,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FlakyPersistence {
    #[must_use]
    pub fn new(inner: InMemoryPersistence) -> Self {
        Self {
            inner,
            failing: Arc::default(),
        }
    }

    /// Make `operation` fail until [`recover`](Self::recover) is called.
    pub fn fail(&self, operation: &str) {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).insert(operation.to_string());
    }

    /// Make `operation` succeed again.
    pub fn recover(&self, operation: &str) {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).remove(operation);
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &InMemoryPersistence {
        &self.inner
    }

    fn check(&self, operation: &str) -> Result<(), PersistenceError> {
        if self.failing.lock().unwrap_or_else(PoisonError::into_inner).contains(operation) {
            return Err(PersistenceError::Transport {
                operation: operation.to_string(),
                reason: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VariablePersistence for FlakyPersistence {
    async fn list(&self, org_id: &str) -> Result<Vec<Variable>, PersistenceError> {
        self.check("list")?;
        self.inner.list(org_id).await
    }

    async fn get(&self, id: &str) -> Result<Variable, PersistenceError> {
        self.check("get")?;
        self.inner.get(id).await
    }

    async fn create(
        &self,
        org_id: &str,
        variable: NewVariable,
    ) -> Result<Variable, PersistenceError> {
        self.check("create")?;
        self.inner.create(org_id, variable).await
    }

    async fn update(&self, id: &str, variable: Variable) -> Result<Variable, PersistenceError> {
        self.check("update")?;
        self.inner.update(id, variable).await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.check("delete")?;
        self.inner.delete(id).await
    }

    async fn add_label(&self, id: &str, label: Label) -> Result<(), PersistenceError> {
        self.check("add_label")?;
        self.inner.add_label(id, label).await
    }

    async fn remove_label(&self, id: &str, label_id: &str) -> Result<(), PersistenceError> {
        self.check("remove_label")?;
        self.inner.remove_label(id, label_id).await
    }
}
