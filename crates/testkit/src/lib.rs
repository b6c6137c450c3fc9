#![warn(missing_docs)]
//! Shared fixtures and deterministic snapshot helpers for tests.

mod fixtures;
mod snapshot;

pub use fixtures::*;
pub use snapshot::*;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
