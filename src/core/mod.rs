//! Core types for varhydrate
//!
//! This module holds the foundation every other module builds on: the variable data
//! model and the crate's error type.
//!
//! # Modules
//!
//! ## `error` - Error Handling
//! - [`HydrateError`] - Error variants escaping an operation
//! - [`ErrorContext`] - User-friendly wrapper with suggestion and details
//! - [`user_friendly_error`] - Convert any error into an [`ErrorContext`]
//!
//! ## `variable` - Variable Model
//! - [`Variable`] - A named placeholder with its [`VariableArguments`]
//! - [`VariableKind`] - Query, map or constant
//! - [`MapValues`] - Ordered key/value pairs of a map variable

pub mod error;
mod variable;

pub use error::{ErrorContext, HydrateError, user_friendly_error};
pub use variable::{
    ContextId, Label, MapValues, NewVariable, Variable, VariableArguments, VariableId,
    VariableKind,
};
