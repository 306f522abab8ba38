//! Integration test suite for varhydrate
//!
//! End-to-end tests through the public API and the CLI binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **scenarios**: Hydration of reference chains, cycles and selections
//! - **cancellation**: Superseded hydrations and concurrent contexts
//! - **service**: Variable actions, store state and notifications
//! - **export**: Transitive dependency export
//! - **cli**: The `varhydrate` binary
//! - **properties**: Ordering and cycle exclusion over generated graphs

mod cancellation;
mod export;
mod properties;
mod scenarios;
mod service;
