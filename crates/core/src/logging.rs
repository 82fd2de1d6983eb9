//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,bento=debug";

/// Initialize the global tracing subscriber.
///
/// Filtering comes from `RUST_LOG` and falls back to [`DEFAULT_FILTER`].
/// A second call is a no-op, so tests and binaries can both call it freely.
///
/// # Example
/// ```
/// bento_core::init_logging();
/// tracing::info!("engine starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
