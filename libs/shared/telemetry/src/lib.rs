//! Tracing initialisation shared across the workspace's binaries and
//! integration tests. Library crates never call this themselves; only the
//! process entry point (or a test harness) should.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialises a `tracing` subscriber for `service_name`.
///
/// In debug builds this emits compact, human-readable lines at `debug`
/// level for the service's own target and `warn` for noisy dependencies.
/// In release builds it emits flattened JSON at `info`, suitable for
/// ingestion by a log aggregator. `RUST_LOG` overrides both defaults.
///
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(service_name: &str) {
    let default_filter = format!(
        "{service_name}={level},tower_http=warn,hyper=warn",
        level = if cfg!(debug_assertions) { "debug" } else { "info" }
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }
}
