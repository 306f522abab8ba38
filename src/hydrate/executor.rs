//! Query execution boundary.
//!
//! The hydration scheduler never talks to a data source itself. It hands each fully
//! substituted query to a [`QueryExecutor`] and awaits the result rows. Executors are
//! expected to honor the cancellation token in [`ExecutionContext`]; the scheduler also
//! abandons the call as soon as the token fires.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use tokio_util::sync::CancellationToken;

/// Failure reported by an executor for one query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ExecutionError {
    /// Human-readable reason
    pub reason: String,
}

impl ExecutionError {
    /// Create an execution error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Everything an executor needs besides the query text.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Organization the query runs against
    pub org_id: String,
    /// Query endpoint of the data source
    pub query_url: String,
    /// Context the hydration belongs to
    pub context_id: String,
    /// Variable being resolved
    pub variable_id: String,
    /// Optional query language tag from the variable
    pub language: Option<String>,
    /// Fires when a newer hydration superseded this one
    pub cancellation_token: CancellationToken,
}

impl ExecutionContext {
    /// Check if the hydration was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

/// Runs substituted queries and returns their result rows as strings.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `query` and return the ordered result values.
    async fn execute(
        &self,
        query: &str,
        ctx: &ExecutionContext,
    ) -> Result<Vec<String>, ExecutionError>;
}

/// Executor answering from a fixed table of query text → rows.
///
/// Backs the `hydrate` CLI command for dry runs against recorded results.
#[derive(Debug, Clone, Default)]
pub struct StaticExecutor {
    results: HashMap<String, Vec<String>>,
}

impl StaticExecutor {
    /// Create an executor from recorded results.
    #[must_use]
    pub fn new(results: HashMap<String, Vec<String>>) -> Self {
        Self {
            results,
        }
    }

    /// Number of recorded queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no results are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl QueryExecutor for StaticExecutor {
    async fn execute(
        &self,
        query: &str,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<String>, ExecutionError> {
        self.results
            .get(query.trim())
            .cloned()
            .ok_or_else(|| ExecutionError::new(format!("no recorded result for query: {query}")))
    }
}
