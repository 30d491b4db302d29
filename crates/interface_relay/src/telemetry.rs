//! Tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;
use crate::error::RelayError;

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<(), RelayError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| RelayError::Telemetry(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    installed.map_err(|e| RelayError::Telemetry(e.to_string()))
}
