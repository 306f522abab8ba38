//! varhydrate - dependency-aware hydration of query variables
//!
//! Variables are named placeholders used inside query templates. A variable is either
//! a query (whose template may reference other variables), a map of keys to literals,
//! or a list of constants. Hydration resolves a set of variables into concrete values
//! for one display context, such as a dashboard cell, while many contexts hydrate
//! concurrently.
//!
//! # Architecture Overview
//!
//! - References between variables are extracted from query text and form a directed
//!   graph. Variables resolve in a deterministic topological order.
//! - Reference cycles are detected and only the cyclic variables are left unresolved
//!   (or, with `strict_cycles`, the hydration fails).
//! - A user selection for a variable in a context short-circuits its resolution.
//! - Each context has at most one live hydration. Starting a new one cancels the old
//!   one, and a superseded hydration can never overwrite newer values.
//!
//! # Core Modules
//!
//! ## Model and plumbing
//! - [`core`] - Variable model and error handling
//! - [`config`] - Configuration file (`~/.varhydrate/config.toml`)
//! - [`cli`] - Command-line interface
//!
//! ## Hydration
//! - [`graph`] - Reference extraction and the dependency graph
//! - [`hydrate`] - Scheduler, executor boundary and resolved values
//! - [`registry`] - One cancellable hydration job per context
//! - [`export`] - Transitive dependencies of a variable for export
//!
//! ## State and actions
//! - [`store`] - Variable definitions and per-context values
//! - [`selection`] - Per-context user selections
//! - [`persistence`] - Storage boundary and in-memory backend
//! - [`notify`] - User-facing notifications
//! - [`service`] - The actions tying everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use varhydrate::core::Variable;
//! use varhydrate::hydrate::{HydrationOptions, StaticExecutor};
//! use varhydrate::notify::TracingNotifier;
//! use varhydrate::persistence::InMemoryPersistence;
//! use varhydrate::service::VariableService;
//!
//! # async fn example() -> Result<(), varhydrate::core::HydrateError> {
//! let service = VariableService::new(
//!     HydrationOptions::default(),
//!     Arc::new(InMemoryPersistence::new()),
//!     Arc::new(StaticExecutor::default()),
//!     Arc::new(TracingNotifier),
//! );
//!
//! let variables = vec![
//!     Variable::constant("y", "Y", ["prod", "staging"]),
//!     Variable::query("x", "X", "from(name: $(Y))"),
//! ];
//! service.select_value("cell-1", "y", "staging");
//! let values = service.refresh_variable_values("cell-1", variables).await?;
//! # Ok(())
//! # }
//! ```

// Model and plumbing
pub mod cli;
pub mod config;
pub mod core;

// Hydration
pub mod export;
pub mod graph;
pub mod hydrate;
pub mod registry;

// State and actions
pub mod notify;
pub mod persistence;
pub mod selection;
pub mod service;
pub mod store;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
