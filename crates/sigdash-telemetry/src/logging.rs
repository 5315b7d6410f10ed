//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level is given.
pub const DEFAULT_FILTER: &str = "info,sigdash=debug";

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `level`; an empty `level` falls back to
/// [`DEFAULT_FILTER`]. Logs go to stderr so command output on stdout stays
/// clean. Output is JSON when `RUST_ENV=production` and pretty
/// otherwise. Fails if a global subscriber is already installed.
pub fn init_logging(level: &str) -> TelemetryResult<()> {
    let fallback = if level.trim().is_empty() {
        DEFAULT_FILTER
    } else {
        level
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let is_production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let result = if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
