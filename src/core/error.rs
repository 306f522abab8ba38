//! Error handling for varhydrate
//!
//! This module provides the crate's error type and user-friendly error reporting for the
//! CLI. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can tell recoverable per-variable failures
//!    apart from batch-level ones
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Resolution**: [`HydrateError::CycleDetected`], [`HydrateError::ExecutionFailed`]
//! - **Lifecycle**: [`HydrateError::Cancelled`] (never shown to users)
//! - **Persistence**: [`HydrateError::NotFound`], [`HydrateError::Persistence`],
//!   [`HydrateError::DuplicateName`], [`HydrateError::RenameConflict`]
//! - **Configuration and I/O**: [`HydrateError::ConfigError`], [`HydrateError::IoError`],
//!   [`HydrateError::TomlError`], [`HydrateError::JsonError`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use varhydrate::core::{HydrateError, user_friendly_error};
//!
//! let error = HydrateError::NotFound {
//!     resource: "variable".to_string(),
//!     id: "0a1b".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::graph::CycleDetected;
use crate::persistence::PersistenceError;

/// The main error type for varhydrate operations.
///
/// Failures local to a single variable are normally recorded in that variable's
/// [`ValueStatus`](crate::hydrate::ValueStatus) rather than returned as an error; the
/// variants here are what escapes a whole operation.
#[derive(Error, Debug)]
pub enum HydrateError {
    /// Variables reference each other in a cycle.
    ///
    /// Only returned when strict cycle handling is configured; by default the cyclic
    /// subset is excluded and the rest of the batch resolves.
    #[error(transparent)]
    CycleDetected(#[from] CycleDetected),

    /// The query for one variable failed to execute
    #[error("Query for variable '{variable_id}' failed: {reason}")]
    ExecutionFailed {
        /// Id of the variable whose query failed
        variable_id: String,
        /// Reason reported by the query executor
        reason: String,
    },

    /// A newer hydration superseded this one
    ///
    /// Callers discard this silently.
    #[error("Hydration for context '{context_id}' was cancelled")]
    Cancelled {
        /// Context whose hydration was superseded
        context_id: String,
    },

    /// A resource was not found in persistence
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Kind of resource (e.g. "variable", "label")
        resource: String,
        /// Identifier that was looked up
        id: String,
    },

    /// Persistence transport failure
    #[error("Failed to {operation}: {reason}")]
    Persistence {
        /// The persistence operation that failed (e.g. "create variable")
        operation: String,
        /// Reason for the failure
        reason: String,
    },

    /// Variable name already used in the organization
    #[error("A variable named '{name}' already exists")]
    DuplicateName {
        /// The conflicting name
        name: String,
    },

    /// Attempted to rename a variable that other queries reference
    #[error("Cannot rename '{name}': referenced by {}", referrers.join(", "))]
    RenameConflict {
        /// Current name of the variable
        name: String,
        /// Names of the variables whose queries reference it
        referrers: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl HydrateError {
    /// Whether this error only means a newer request replaced the current one.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl Clone for HydrateError {
    fn clone(&self) -> Self {
        match self {
            Self::CycleDetected(cycle) => Self::CycleDetected(cycle.clone()),
            Self::ExecutionFailed {
                variable_id,
                reason,
            } => Self::ExecutionFailed {
                variable_id: variable_id.clone(),
                reason: reason.clone(),
            },
            Self::Cancelled {
                context_id,
            } => Self::Cancelled {
                context_id: context_id.clone(),
            },
            Self::NotFound {
                resource,
                id,
            } => Self::NotFound {
                resource: resource.clone(),
                id: id.clone(),
            },
            Self::Persistence {
                operation,
                reason,
            } => Self::Persistence {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::DuplicateName {
                name,
            } => Self::DuplicateName {
                name: name.clone(),
            },
            Self::RenameConflict {
                name,
                referrers,
            } => Self::RenameConflict {
                name: name.clone(),
                referrers: referrers.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // io::Error and serde_json::Error don't implement Clone
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::TomlError(e) => Self::TomlError(e.clone()),
            Self::JsonError(e) => Self::Other {
                message: format!("JSON parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

impl From<PersistenceError> for HydrateError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::NotFound {
                resource,
                id,
            } => Self::NotFound {
                resource,
                id,
            },
            PersistenceError::Conflict {
                name,
            } => Self::DuplicateName {
                name,
            },
            PersistenceError::Transport {
                operation,
                reason,
            } => Self::Persistence {
                operation,
                reason,
            },
        }
    }
}

/// Error wrapper that carries a suggestion and details for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: HydrateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub fn new(error: HydrateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: message in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with suggestions.
///
/// Recognizes [`HydrateError`], [`std::io::Error`] and [`toml::de::Error`]; anything else
/// is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(hydrate_error) = error.downcast_ref::<HydrateError>() {
        return create_error_context(hydrate_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::NotFound
    {
        return ErrorContext::new(HydrateError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check that the file exists and the path is correct");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(HydrateError::TomlError(toml_error.clone()))
            .with_suggestion("Check the TOML syntax. Verify quotes, brackets, and table names");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(HydrateError::Other {
        message,
    })
}

fn create_error_context(error: HydrateError) -> ErrorContext {
    match &error {
        HydrateError::CycleDetected(cycle) => {
            let names = cycle.names().join(", ");
            ErrorContext::new(error)
                .with_suggestion("Break the cycle by removing one of the references between these variables")
                .with_details(format!("Variables in the cycle: {names}"))
        }
        HydrateError::ExecutionFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run the query on its own to check it against the data source"),
        HydrateError::NotFound {
            resource,
            ..
        } => {
            let suggestion = format!("Check that the {resource} exists in this organization");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        HydrateError::DuplicateName {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Variable names must be unique within an organization; pick another name"),
        HydrateError::RenameConflict {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Update the referencing queries first, then rename the variable")
            .with_details("Queries refer to variables by name, so a rename would leave them dangling"),
        HydrateError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check ~/.varhydrate/config.toml or the file passed with --config"),
        _ => ErrorContext::new(error),
    }
}
