//! Variable actions.
//!
//! [`VariableService`] is the one place that coordinates persistence, the store, the
//! selection overlay, the cancellation registry and the hydration scheduler. Every
//! action records its progress in the store and reports its terminal outcome to the
//! notification sink exactly once; cancelled hydrations are dropped without a report.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::core::{HydrateError, Label, NewVariable, Variable};
use crate::export::VariableExport;
use crate::graph::{ReferenceSyntax, referenced_names};
use crate::hydrate::{HydrationOptions, HydrationRequest, QueryExecutor, VariableValuesByID, hydrate};
use crate::notify::{Notification, NotificationSink};
use crate::persistence::VariablePersistence;
use crate::registry::CancellationRegistry;
use crate::selection::SelectionOverlay;
use crate::store::{ContextValues, RemoteDataState, VariableStore};

/// Coordinates variable actions for one organization.
#[derive(Clone)]
pub struct VariableService {
    options: HydrationOptions,
    persistence: Arc<dyn VariablePersistence>,
    executor: Arc<dyn QueryExecutor>,
    notifier: Arc<dyn NotificationSink>,
    store: VariableStore,
    selections: SelectionOverlay,
    registry: CancellationRegistry,
}

impl VariableService {
    /// Create a service for the organization named in `options`.
    pub fn new(
        options: HydrationOptions,
        persistence: Arc<dyn VariablePersistence>,
        executor: Arc<dyn QueryExecutor>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            options,
            persistence,
            executor,
            notifier,
            store: VariableStore::new(),
            selections: SelectionOverlay::new(),
            registry: CancellationRegistry::new(),
        }
    }

    #[must_use]
    pub fn org_id(&self) -> &str {
        &self.options.org_id
    }

    #[must_use]
    pub fn options(&self) -> &HydrationOptions {
        &self.options
    }

    #[must_use]
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    #[must_use]
    pub fn selections(&self) -> &SelectionOverlay {
        &self.selections
    }

    #[must_use]
    pub fn registry(&self) -> &CancellationRegistry {
        &self.registry
    }

    /// Last-known values of `context_id`.
    #[must_use]
    pub fn values(&self, context_id: &str) -> Option<ContextValues> {
        self.store.values(context_id)
    }

    /// Fetch the organization's variables into the store.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure after notifying `GetVariablesFailed`.
    #[instrument(skip(self), fields(org_id = %self.options.org_id))]
    pub async fn load_variables(&self) -> Result<Vec<Variable>, HydrateError> {
        self.store.set_variables(RemoteDataState::Loading, None);

        match self.persistence.list(&self.options.org_id).await {
            Ok(variables) => {
                debug!(count = variables.len(), "loaded variables");
                self.store.set_variables(RemoteDataState::Done, Some(variables.clone()));
                Ok(variables)
            }
            Err(error) => {
                warn!("failed to load variables: {error}");
                self.store.set_variables(RemoteDataState::Error, None);
                self.notifier.notify(Notification::get_variables_failed());
                Err(error.into())
            }
        }
    }

    /// Fetch one variable into the store.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure after notifying `GetVariableFailed`.
    #[instrument(skip(self))]
    pub async fn load_variable(&self, id: &str) -> Result<Variable, HydrateError> {
        self.store.set_variable(id, RemoteDataState::Loading, None);

        match self.persistence.get(id).await {
            Ok(variable) => {
                self.store.set_variable(id, RemoteDataState::Done, Some(variable.clone()));
                Ok(variable)
            }
            Err(error) => {
                warn!("failed to load variable: {error}");
                self.store.set_variable(id, RemoteDataState::Error, None);
                self.notifier.notify(Notification::get_variable_failed());
                Err(error.into())
            }
        }
    }

    /// Create a variable in the organization.
    ///
    /// # Errors
    ///
    /// [`HydrateError::DuplicateName`] if the name is taken, or the persistence failure.
    #[instrument(skip(self, variable), fields(name = %variable.name))]
    pub async fn create_variable(&self, variable: NewVariable) -> Result<Variable, HydrateError> {
        match self.persistence.create(&self.options.org_id, variable).await {
            Ok(created) => {
                info!(id = %created.id, "created variable");
                self.store.set_variable(&created.id, RemoteDataState::Done, Some(created.clone()));
                self.notifier.notify(Notification::create_variable_success(&created.name));
                Ok(created)
            }
            Err(error) => {
                let error = HydrateError::from(error);
                warn!("failed to create variable: {error}");
                self.notifier.notify(Notification::create_variable_failed(&error));
                Err(error)
            }
        }
    }

    /// Replace the definition of `id`.
    ///
    /// Renaming is rejected while other variables' queries still use the current name.
    ///
    /// # Errors
    ///
    /// [`HydrateError::RenameConflict`] naming the referrers, or the persistence failure.
    #[instrument(skip(self, variable), fields(name = %variable.name))]
    pub async fn update_variable(
        &self,
        id: &str,
        variable: Variable,
    ) -> Result<Variable, HydrateError> {
        self.store.set_variable(id, RemoteDataState::Loading, None);

        match self.try_update(id, variable).await {
            Ok(updated) => {
                self.store.set_variable(id, RemoteDataState::Done, Some(updated.clone()));
                self.notifier.notify(Notification::update_variable_success(&updated.name));
                Ok(updated)
            }
            Err(error) => {
                warn!("failed to update variable: {error}");
                self.store.set_variable(id, RemoteDataState::Error, None);
                self.notifier.notify(Notification::update_variable_failed(&error));
                Err(error)
            }
        }
    }

    async fn try_update(&self, id: &str, variable: Variable) -> Result<Variable, HydrateError> {
        let current = self.persistence.get(id).await?;

        if current.name != variable.name {
            let all = self.persistence.list(&current.org_id).await?;
            let referrers = referrers_of(&current, &all, self.options.syntax);
            if !referrers.is_empty() {
                return Err(HydrateError::RenameConflict {
                    name: current.name,
                    referrers,
                });
            }
        }

        Ok(self.persistence.update(id, variable).await?)
    }

    /// Delete `id` from persistence, the store and every context's selections.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure after notifying `DeleteVariableFailed`.
    #[instrument(skip(self))]
    pub async fn delete_variable(&self, id: &str) -> Result<(), HydrateError> {
        let known = self.store.variable(id).is_some();
        if known {
            self.store.set_variable(id, RemoteDataState::Loading, None);
        }

        match self.persistence.delete(id).await {
            Ok(()) => {
                self.store.remove_variable(id);
                let contexts = self.selections.remove_variable(id);
                info!(contexts, "deleted variable");
                self.notifier.notify(Notification::delete_variable_success());
                Ok(())
            }
            Err(error) => {
                let error = HydrateError::from(error);
                warn!("failed to delete variable: {error}");
                if known {
                    self.store.set_variable(id, RemoteDataState::Done, None);
                }
                self.notifier.notify(Notification::delete_variable_failed(&error));
                Err(error)
            }
        }
    }

    /// Attach `label` to `id` and refresh the stored variable.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure after notifying `AddLabelFailed`.
    #[instrument(skip(self, label), fields(label_id = %label.id))]
    pub async fn add_label(&self, id: &str, label: Label) -> Result<Variable, HydrateError> {
        let result = match self.persistence.add_label(id, label).await {
            Ok(()) => self.persistence.get(id).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(variable) => {
                self.store.set_variable(id, RemoteDataState::Done, Some(variable.clone()));
                Ok(variable)
            }
            Err(error) => {
                warn!("failed to add label: {error}");
                self.notifier.notify(Notification::add_label_failed());
                Err(error.into())
            }
        }
    }

    /// Detach `label_id` from `id` and refresh the stored variable.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure after notifying `RemoveLabelFailed`.
    #[instrument(skip(self))]
    pub async fn remove_label(&self, id: &str, label_id: &str) -> Result<Variable, HydrateError> {
        let result = match self.persistence.remove_label(id, label_id).await {
            Ok(()) => self.persistence.get(id).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(variable) => {
                self.store.set_variable(id, RemoteDataState::Done, Some(variable.clone()));
                Ok(variable)
            }
            Err(error) => {
                warn!("failed to remove label: {error}");
                self.notifier.notify(Notification::remove_label_failed());
                Err(error.into())
            }
        }
    }

    /// Hydrate `variables` for `context_id` and store the result.
    ///
    /// Starting a refresh supersedes any refresh still running for the same context.
    /// Organization variables referenced by `variables` are taken from the store.
    ///
    /// Returns the committed values, or `None` when this refresh was superseded or
    /// cancelled before it could commit. A refresh cancelled without being superseded
    /// restores the context state it found.
    ///
    /// # Errors
    ///
    /// Returns the hydration failure (for example a strict-mode cycle) after marking the
    /// context `Error` and notifying `ResolutionFailed`.
    #[instrument(skip(self, variables), fields(variables = variables.len()))]
    pub async fn refresh_variable_values(
        &self,
        context_id: &str,
        variables: Vec<Variable>,
    ) -> Result<Option<VariableValuesByID>, HydrateError> {
        let previous = self.store.values(context_id);
        self.store.set_values(context_id, RemoteDataState::Loading, None);

        let request = HydrationRequest::new(context_id, variables)
            .with_all_variables(self.store.variables())
            .with_selections(self.selections.snapshot(context_id));

        let job = self.registry.start(context_id);
        let outcome = hydrate(&request, &self.options, self.executor.as_ref(), &job.token).await;

        let result = match outcome {
            Ok(values) => {
                let committed = self.registry.commit(&job, || {
                    self.store.set_values(context_id, RemoteDataState::Done, Some(values.clone()));
                });
                if committed.is_some() {
                    debug!(generation = job.generation, "committed variable values");
                    Ok(Some(values))
                } else {
                    Ok(None)
                }
            }
            Err(error) if error.is_cancelled() => {
                debug!(generation = job.generation, "variable refresh cancelled");
                // Cancelled in place: put back the state this refresh replaced
                self.registry.commit_owned(&job, || match previous {
                    Some(previous) => {
                        self.store.set_values(context_id, previous.status, previous.values);
                    }
                    None => self.store.remove_context(context_id),
                });
                Ok(None)
            }
            Err(error) => {
                let committed = self.registry.commit(&job, || {
                    self.store.set_values(context_id, RemoteDataState::Error, None);
                });
                if committed.is_some() {
                    warn!("failed to resolve variables: {error}");
                    self.notifier.notify(Notification::resolution_failed(context_id, &error));
                    Err(error)
                } else {
                    Ok(None)
                }
            }
        };

        self.registry.finish(&job);
        result
    }

    /// Record a user selection; takes effect on the next refresh of the context.
    ///
    /// Returns the previous selection.
    pub fn select_value(
        &self,
        context_id: &str,
        variable_id: &str,
        value: impl Into<String>,
    ) -> Option<String> {
        self.selections.select(context_id, variable_id, value)
    }

    /// Bundle `id` with every variable it depends on.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure after notifying `ExportFailed`.
    #[instrument(skip(self))]
    pub async fn export_variable(&self, id: &str) -> Result<VariableExport, HydrateError> {
        match self.try_export(id).await {
            Ok(export) => {
                debug!(dependencies = export.dependencies.len(), "exported variable");
                Ok(export)
            }
            Err(error) => {
                warn!("failed to export variable: {error}");
                self.notifier.notify(Notification::export_failed(&error));
                Err(error)
            }
        }
    }

    async fn try_export(&self, id: &str) -> Result<VariableExport, HydrateError> {
        let variable = self.persistence.get(id).await?;
        let all = self.persistence.list(&variable.org_id).await?;
        Ok(VariableExport::new(variable, &all, self.options.syntax))
    }

    /// Cancel the context's hydration and forget its values and selections.
    #[instrument(skip(self))]
    pub fn teardown_context(&self, context_id: &str) {
        self.registry.teardown(context_id);
        self.store.remove_context(context_id);
        self.selections.clear_context(context_id);
        debug!("context torn down");
    }
}

/// Names of the variables whose queries reference `target`, sorted.
fn referrers_of(target: &Variable, variables: &[Variable], syntax: ReferenceSyntax) -> Vec<String> {
    let mut referrers: Vec<String> = variables
        .iter()
        .filter(|candidate| candidate.id != target.id)
        .filter(|candidate| {
            candidate
                .arguments
                .query_text()
                .is_some_and(|query| referenced_names(query, syntax).contains(&target.name))
        })
        .map(|candidate| candidate.name.clone())
        .collect();
    referrers.sort();
    referrers
}
