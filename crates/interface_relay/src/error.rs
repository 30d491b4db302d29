//! Relay error types

use thiserror::Error;

use domain_outbox::OutboxError;
use infra_db::DatabaseError;

/// Errors raised while configuring or starting the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration could not be read or deserialised
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration was read but failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// The tracing subscriber was already installed
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}
