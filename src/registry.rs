//! One live hydration job per context.
//!
//! Starting a hydration for a context supersedes whatever job was running for it: the
//! older job's token is cancelled and its generation stops being current, so its results
//! are discarded even if it finishes later.
//!
//! # Example
//!
//! ```
//! use varhydrate::registry::CancellationRegistry;
//!
//! let registry = CancellationRegistry::new();
//! let first = registry.start("cell-1");
//! let second = registry.start("cell-1");
//!
//! assert!(first.token.is_cancelled());
//! assert_eq!(registry.commit(&first, || "stale"), None);
//! assert_eq!(registry.commit(&second, || "fresh"), Some("fresh"));
//! ```

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::ContextId;

/// Handle for one started hydration.
#[derive(Debug, Clone)]
pub struct HydrationJob {
    /// Context being hydrated
    pub context_id: ContextId,
    /// Registry-wide, strictly increasing job number
    pub generation: u64,
    /// Fires when the job is superseded, cancelled or torn down
    pub token: CancellationToken,
}

impl HydrationJob {
    /// Check if the job was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct ActiveJob {
    generation: u64,
    token: CancellationToken,
}

/// Tracks the current hydration job of every context.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    jobs: Arc<DashMap<ContextId, ActiveJob>>,
    next_generation: Arc<AtomicU64>,
}

impl CancellationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job for `context_id`, cancelling the previous one.
    pub fn start(&self, context_id: &str) -> HydrationJob {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let previous = self.jobs.insert(
            context_id.to_string(),
            ActiveJob {
                generation,
                token: token.clone(),
            },
        );

        if let Some(previous) = previous {
            debug!(
                context_id,
                superseded = previous.generation,
                generation,
                "superseding hydration job"
            );
            previous.token.cancel();
        } else {
            debug!(context_id, generation, "starting hydration job");
        }

        HydrationJob {
            context_id: context_id.to_string(),
            generation,
            token,
        }
    }

    /// Cancel the current job of `context_id` and keep its slot.
    ///
    /// The cancelled job can no longer [`commit`](Self::commit), but it still owns the
    /// slot until it finishes, so it may roll back its own progress with
    /// [`commit_owned`](Self::commit_owned).
    ///
    /// Returns true if a job was cancelled.
    pub fn cancel(&self, context_id: &str) -> bool {
        match self.jobs.get(context_id) {
            Some(job) => {
                warn!(context_id, generation = job.generation, "cancelling hydration job");
                job.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel and forget the job of `context_id`.
    pub fn teardown(&self, context_id: &str) {
        if let Some((_, job)) = self.jobs.remove(context_id) {
            debug!(context_id, generation = job.generation, "tearing down hydration job");
            job.token.cancel();
        }
    }

    /// Whether `job` is still the live job of its context.
    #[must_use]
    pub fn is_current(&self, job: &HydrationJob) -> bool {
        self.jobs.get(&job.context_id).is_some_and(|active| {
            active.generation == job.generation && !active.token.is_cancelled()
        })
    }

    /// Run `write` if `job` is still the live job of its context.
    ///
    /// The check and the write happen while the context's slot is locked, so a
    /// concurrent [`start`](Self::start) cannot slip in between. `write` must not call
    /// back into this registry.
    pub fn commit<R>(&self, job: &HydrationJob, write: impl FnOnce() -> R) -> Option<R> {
        let active = self.jobs.get(&job.context_id)?;
        if active.generation != job.generation || active.token.is_cancelled() {
            debug!(
                context_id = %job.context_id,
                generation = job.generation,
                current = active.generation,
                "discarding stale hydration result"
            );
            return None;
        }

        let result = write();
        drop(active);
        Some(result)
    }

    /// Run `write` if the slot of `job`'s context still belongs to it, even when cancelled.
    ///
    /// Returns `None` once a newer job took the slot or the context was torn down.
    pub fn commit_owned<R>(&self, job: &HydrationJob, write: impl FnOnce() -> R) -> Option<R> {
        let active = self.jobs.get(&job.context_id)?;
        if active.generation != job.generation {
            return None;
        }

        let result = write();
        drop(active);
        Some(result)
    }

    /// Release the slot of `job` if it is still the current one.
    pub fn finish(&self, job: &HydrationJob) {
        self.jobs.remove_if(&job.context_id, |_, active| active.generation == job.generation);
    }

    /// Number of contexts with a job slot.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }
}
