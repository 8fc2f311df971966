//! Logging setup for hosts embedding the provider.
//!
//! Logs go to **stderr** so stdout stays free for whatever protocol the host
//! speaks. The API key is never logged.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `endpointmonitor_provider=debug`)
//!
//! ```bash
//! # Every HTTP call the client makes
//! RUST_LOG=endpointmonitor_provider::client=debug ./my-host
//!
//! # Engine spans and drift warnings
//! RUST_LOG=endpointmonitor_provider=debug ./my-host
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn install(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Initialize the default logging subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`, and writes compact lines to stderr.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```no_run
/// endpointmonitor_provider::init_logging();
/// tracing::info!("Host starting");
/// ```
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level used when `RUST_LOG` is
/// not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = install(default_level) {
        panic!("failed to install tracing subscriber: {e}");
    }
}

/// Try to initialize logging, returning `false` if a subscriber was already
/// set. Safe to call from every test.
pub fn try_init_logging() -> bool {
    install("info").is_ok()
}
