//! Test utilities for varhydrate
//!
//! Shared by unit tests and the integration suite (through the `test-utils` feature):
//!
//! - [`RecordingExecutor`] answers scripted queries and records what was dispatched
//! - [`GatedExecutor`] holds its first query until released, for cancellation races
//! - [`FlakyPersistence`] fails chosen persistence operations on demand
//! - [`VariablesFixture`] and [`ResultsFixture`] write CLI input files
//!
//! # Example
//!
//! ```rust,no_run
//! use varhydrate::test_utils::{RecordingExecutor, init_test_logging};
//!
//! init_test_logging(None);
//! let executor = RecordingExecutor::new().with_rows("buckets()", ["telegraf"]);
//! ```

pub mod executors;
pub mod fixtures;
pub mod persistence;

pub use executors::{GatedExecutor, RecordingExecutor};
pub use fixtures::{ResultsFixture, VariablesFixture, org_variables};
pub use persistence::FlakyPersistence;

pub use crate::notify::MemoryNotifier;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set that level is used; otherwise
/// `RUST_LOG` is honored, and without either nothing is logged.
///
/// ```bash
/// RUST_LOG=varhydrate=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
