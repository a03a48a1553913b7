//! `tracing` initialisation for applications embedding this crate.
//!
//! Grounded on `server/src/app.rs::CoreApp::init_logging`: filter resolved
//! from an env var with a sane default, compact non-ANSI-agnostic output.
//! Gated behind the `telemetry` feature so embedding applications that
//! already configure their own subscriber don't get a second one for free.

use std::env;

use tracing_subscriber::EnvFilter;

use crate::constants;

/// Installs a global `tracing` subscriber.
///
/// Filter directive resolution order: `BUS_LOG`, then `RUST_LOG`, then
/// [`constants::DEFAULT_LOG_FILTER`]. Intended for example binaries and
/// standalone use; a host application with its own `tracing_subscriber`
/// setup should not call this.
pub fn init() {
    let filter = env::var(constants::ENV_BUS_LOG)
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| constants::DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .compact()
        .init();
}
