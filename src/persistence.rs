//! Variable persistence boundary.
//!
//! The service reads and writes variable definitions through [`VariablePersistence`].
//! [`InMemoryPersistence`] implements it on a concurrent map and backs the CLI and the
//! test suites; [`VariableFile`] seeds it from a TOML or JSON file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::core::{Label, NewVariable, Variable, VariableArguments, VariableId};

/// Failures reported by a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("{resource} '{id}' not found")]
    NotFound {
        resource: String,
        id: String,
    },

    /// Another variable in the organization already uses the name
    #[error("A variable named '{name}' already exists")]
    Conflict {
        name: String,
    },

    /// The backend could not complete the request
    #[error("{operation} failed: {reason}")]
    Transport {
        operation: String,
        reason: String,
    },
}

impl PersistenceError {
    /// A missing variable.
    pub fn variable_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "variable".to_string(),
            id: id.into(),
        }
    }
}

/// Storage of variable definitions, scoped by organization.
#[async_trait]
pub trait VariablePersistence: Send + Sync {
    /// Every variable of `org_id`.
    async fn list(&self, org_id: &str) -> Result<Vec<Variable>, PersistenceError>;

    /// One variable by id.
    async fn get(&self, id: &str) -> Result<Variable, PersistenceError>;

    /// Store a new variable in `org_id` and return it with its assigned id.
    async fn create(&self, org_id: &str, variable: NewVariable)
    -> Result<Variable, PersistenceError>;

    /// Replace the definition of `id`.
    async fn update(&self, id: &str, variable: Variable) -> Result<Variable, PersistenceError>;

    /// Remove `id`.
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// Attach `label` to `id`.
    async fn add_label(&self, id: &str, label: Label) -> Result<(), PersistenceError>;

    /// Detach the label `label_id` from `id`.
    async fn remove_label(&self, id: &str, label_id: &str) -> Result<(), PersistenceError>;
}

/// [`VariablePersistence`] on a concurrent in-process map.
///
/// Names are unique per organization. Mutations are serialized so the uniqueness check
/// and the write cannot interleave.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    variables: Arc<DashMap<VariableId, Variable>>,
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryPersistence {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend holding `variables` as given.
    #[must_use]
    pub fn with_variables(variables: impl IntoIterator<Item = Variable>) -> Self {
        let persistence = Self::new();
        for variable in variables {
            persistence.variables.insert(variable.id.clone(), variable);
        }
        persistence
    }

    /// Number of stored variables across all organizations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn name_taken(&self, org_id: &str, name: &str, except: Option<&str>) -> bool {
        self.variables.iter().any(|entry| {
            entry.org_id == org_id && entry.name == name && Some(entry.id.as_str()) != except
        })
    }

    fn modify<R>(
        &self,
        id: &str,
        change: impl FnOnce(&mut Variable) -> R,
    ) -> Result<R, PersistenceError> {
        let mut entry =
            self.variables.get_mut(id).ok_or_else(|| PersistenceError::variable_not_found(id))?;
        let variable = entry.value_mut();
        let result = change(variable);
        variable.updated_at = Some(Utc::now());
        Ok(result)
    }
}

#[async_trait]
impl VariablePersistence for InMemoryPersistence {
    async fn list(&self, org_id: &str) -> Result<Vec<Variable>, PersistenceError> {
        let mut variables: Vec<Variable> = self
            .variables
            .iter()
            .filter(|entry| entry.org_id == org_id)
            .map(|entry| entry.value().clone())
            .collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(variables)
    }

    async fn get(&self, id: &str) -> Result<Variable, PersistenceError> {
        self.variables
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PersistenceError::variable_not_found(id))
    }

    async fn create(
        &self,
        org_id: &str,
        variable: NewVariable,
    ) -> Result<Variable, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        if self.name_taken(org_id, &variable.name, None) {
            return Err(PersistenceError::Conflict {
                name: variable.name,
            });
        }

        let now = Utc::now();
        let created = Variable {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            name: variable.name,
            arguments: variable.arguments,
            labels: variable.labels,
            created_at: Some(now),
            updated_at: Some(now),
        };

        debug!(id = %created.id, name = %created.name, org_id, "created variable");
        self.variables.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, variable: Variable) -> Result<Variable, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let existing = self.get(id).await?;
        if self.name_taken(&existing.org_id, &variable.name, Some(id)) {
            return Err(PersistenceError::Conflict {
                name: variable.name,
            });
        }

        let updated = Variable {
            id: existing.id,
            org_id: existing.org_id,
            created_at: existing.created_at,
            updated_at: Some(Utc::now()),
            ..variable
        };

        self.variables.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.variables
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::variable_not_found(id))
    }

    async fn add_label(&self, id: &str, label: Label) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.modify(id, |variable| {
            if !variable.labels.iter().any(|existing| existing.id == label.id) {
                variable.labels.push(label);
            }
        })
    }

    async fn remove_label(&self, id: &str, label_id: &str) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let removed = self.modify(id, |variable| {
            let before = variable.labels.len();
            variable.labels.retain(|label| label.id != label_id);
            variable.labels.len() != before
        })?;

        if removed {
            Ok(())
        } else {
            Err(PersistenceError::NotFound {
                resource: "label".to_string(),
                id: label_id.to_string(),
            })
        }
    }
}

/// A variable as written in a variables file; the id defaults to the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVariable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: VariableArguments,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

/// Contents of a variables file.
///
/// ```toml
/// org_id = "my-org"
///
/// [[variables]]
/// name = "bucket"
/// arguments = { type = "constant", values = ["telegraf", "system"] }
///
/// [[variables]]
/// name = "measurement"
/// arguments = { type = "query", query = "measurements(bucket: \"$(bucket)\")" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableFile {
    /// Organization the variables belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default)]
    pub variables: Vec<FileVariable>,
}

impl VariableFile {
    /// Load a variables file; `.json` files are read as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read variables file: {}", path.display()))?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse variables file: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse variables file: {}", path.display()))
        }
    }

    /// Materialize the file's variables under `default_org` unless the file names one.
    #[must_use]
    pub fn into_variables(self, default_org: &str) -> Vec<Variable> {
        let org_id = self.org_id.unwrap_or_else(|| default_org.to_string());
        self.variables
            .into_iter()
            .map(|entry| Variable {
                id: entry.id.unwrap_or_else(|| entry.name.clone()),
                org_id: org_id.clone(),
                name: entry.name,
                arguments: entry.arguments,
                labels: entry.labels,
                created_at: None,
                updated_at: None,
            })
            .collect()
    }
}
