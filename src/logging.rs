//! Log subscriber setup.
//!
//! The library only emits `tracing` events; hosts call [`init`] once to
//! print them.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// # Example
/// ```no_run
/// hoist_line::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Test variant: debug level, captured by the test harness, safe to call
/// repeatedly.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
