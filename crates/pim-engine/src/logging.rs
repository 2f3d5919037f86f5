//! Tracing subscriber setup for the `pim-engine` binary
//!
//! Library code only emits events. The filter comes from `RUST_LOG` and
//! falls back to the given default directive.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, human-readable or JSON
///
/// # Errors
/// [`TryInitError`] if a global subscriber is already installed
pub fn init(json: bool) -> Result<(), TryInitError> {
    init_with_default(json, DEFAULT_FILTER)
}

/// # Errors
/// As [`init`]
pub fn init_with_default(json: bool, default_filter: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    }
}
