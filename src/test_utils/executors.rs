//! Scripted query executors.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

use crate::hydrate::{ExecutionContext, ExecutionError, QueryExecutor};

/// Executor answering from a script and recording every dispatched query.
///
/// Queries without a scripted answer fail with "unexpected query".
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    responses: HashMap<String, Result<Vec<String>, String>>,
    dispatched: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `rows`.
    #[must_use]
    pub fn with_rows<I>(mut self, query: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.responses.insert(query.into(), Ok(rows.into_iter().map(Into::into).collect()));
        self
    }

    /// Fail `query` with `reason`.
    #[must_use]
    pub fn with_failure(mut self, query: impl Into<String>, reason: impl Into<String>) -> Self {
        self.responses.insert(query.into(), Err(reason.into()));
        self
    }

    /// Queries received so far, in order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(
        &self,
        query: &str,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<String>, ExecutionError> {
        self.dispatched.lock().unwrap_or_else(PoisonError::into_inner).push(query.to_string());

        match self.responses.get(query) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(reason)) => Err(ExecutionError::new(reason.clone())),
            None => Err(ExecutionError::new(format!("unexpected query: {query}"))),
        }
    }
}

/// Executor whose first call blocks until [`release`](Self::release).
///
/// The first call answers `first_rows`, every later call answers `later_rows` at once.
/// The blocked call ignores cancellation, like a slow backend that never checks.
#[derive(Debug, Clone)]
pub struct GatedExecutor {
    first_rows: Vec<String>,
    later_rows: Vec<String>,
    calls: Arc<AtomicUsize>,
    started: Arc<Notify>,
    gate: Arc<Notify>,
}

impl GatedExecutor {
    pub fn new<S: Into<String>>(
        first_rows: impl IntoIterator<Item = S>,
        later_rows: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            first_rows: first_rows.into_iter().map(Into::into).collect(),
            later_rows: later_rows.into_iter().map(Into::into).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(Notify::new()),
            gate: Arc::new(Notify::new()),
        }
    }

    /// Wait until the first call is blocked on the gate.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let the first call return.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for GatedExecutor {
    async fn execute(
        &self,
        _query: &str,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<String>, ExecutionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.gate.notified().await;
            Ok(self.first_rows.clone())
        } else {
            Ok(self.later_rows.clone())
        }
    }
}
