//! Tracing setup for embedding processes.
//!
//! The coordination crate only emits `tracing` events; the hosting process
//! decides where they go. This helper installs a sensible default
//! subscriber for binaries and integration runs.

use tracing_subscriber::EnvFilter;

/// Install a global subscriber honoring `RUST_LOG`, defaulting to `info`
/// for this crate. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scribe_coordination=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
