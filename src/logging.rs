//! Logging initialisation
//!
//! `RUST_LOG` takes precedence over the level passed on the command line,
//! e.g. `RUST_LOG=proxy_harvest=debug`.

use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter from `RUST_LOG`, falling back to `default_level`
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber; later calls are no-ops
pub fn init(default_level: &str, json: bool) {
    let builder = fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_line_number(true);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Subscriber for tests, captured by the test harness
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
