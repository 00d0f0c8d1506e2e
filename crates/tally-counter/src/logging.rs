#![forbid(unsafe_code)]

//! Tracing subscriber setup for the counter binary.
//!
//! Logs go to stderr so they never interleave with the rendered counter on
//! stdout. `RUST_LOG` wins over the configured level when it is set.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if present and valid, else `level`.
#[must_use]
pub fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(level: &str, json: bool) -> bool {
    let filter = filter_for(level);
    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
    };
    installed.is_ok()
}
