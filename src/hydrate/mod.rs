//! Variable hydration: resolving a context's variables into concrete values.
//!
//! - [`scheduler`] - dependency-ordered resolution for one context
//! - [`executor`] - the query execution boundary
//! - [`values`] - per-variable results and the per-context mapping

pub mod executor;
pub mod scheduler;
pub mod values;

pub use executor::{
    CancellationToken, ExecutionContext, ExecutionError, QueryExecutor, StaticExecutor,
};
pub use scheduler::{HydrationOptions, HydrationRequest, hydrate};
pub use values::{ValueStatus, VariableValues, VariableValuesByID, default_selection};
