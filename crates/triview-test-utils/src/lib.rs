//! Testing utilities for the Triview workspace
//!
//! Shared fixtures, an in-memory query service and tracing setup.

#![allow(missing_docs)]

mod fixtures;
mod service;

pub use fixtures::*;
pub use service::InMemoryQueryService;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; later calls are ignored
///
/// Honors `RUST_LOG`, defaulting to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
