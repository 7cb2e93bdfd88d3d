//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Keeps stderr quiet apart from
/// skipped events and stalled streams.
pub const DEFAULT_FILTER: &str = "warn";

/// Installs the global subscriber, writing compact lines to stderr.
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false).compact();

    let _ = tracing_subscriber::registry().with(env_filter).with(stderr_layer).try_init();
}
