//! Relay configuration
//!
//! Read from `OUTBOX_`-prefixed environment variables. Every key has a default,
//! so an empty environment yields a working in-memory relay.

use std::time::Duration;

use serde::Deserialize;
use validator::{Validate, ValidationError};

use domain_outbox::{DispatcherConfig, RetryPolicy};
use infra_db::DatabaseConfig;

use crate::error::RelayError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "OUTBOX";

/// Which outbox store the relay runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxBackend {
    #[default]
    Memory,
    #[serde(alias = "postgresql")]
    Postgres,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Relay configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_retry_window"))]
pub struct RelayConfig {
    pub backend: OutboxBackend,
    /// PostgreSQL connection string, used by the postgres backend only
    #[validate(length(min = 1))]
    pub database_url: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
    /// Written to `claimed_by` on every claimed envelope
    #[validate(length(min = 1, max = 128))]
    pub worker_id: String,
    #[validate(range(min = 1, max = 10000))]
    pub batch_size: u32,
    #[validate(range(min = 1))]
    pub lease_secs: u64,
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

fn validate_retry_window(config: &RelayConfig) -> Result<(), ValidationError> {
    if config.retry_base_ms > config.retry_max_ms {
        let mut error = ValidationError::new("retry_window");
        error.message = Some("retry_base_ms must not exceed retry_max_ms".into());
        return Err(error);
    }
    Ok(())
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backend: OutboxBackend::Memory,
            database_url: "postgres://localhost/commerce".to_string(),
            max_connections: 10,
            worker_id: format!("relay-{}", std::process::id()),
            batch_size: 100,
            lease_secs: 30,
            poll_interval_ms: 1000,
            max_attempts: 5,
            retry_base_ms: 1000,
            retry_max_ms: 300_000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Loads and validates configuration from an arbitrary source
    pub fn from_source<S>(source: S) -> Result<Self, RelayError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_ms),
            Duration::from_millis(self.retry_max_ms),
        )
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_worker_id(self.worker_id.clone())
            .with_batch_size(self.batch_size)
            .with_lease(self.lease())
            .with_poll_interval(self.poll_interval())
            .with_retry(self.retry_policy())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(1)
            .application_name(format!("outbox-relay/{}", self.worker_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_id.starts_with("relay-"));
        assert_eq!(config.backend, OutboxBackend::Memory);
    }

    #[test]
    fn test_retry_window_checked() {
        let config = RelayConfig {
            retry_base_ms: 10_000,
            retry_max_ms: 1_000,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = RelayConfig {
            batch_size: 0,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatcher_config_carries_settings() {
        let config = RelayConfig {
            worker_id: "relay-a".to_string(),
            batch_size: 25,
            lease_secs: 12,
            ..RelayConfig::default()
        };
        let dispatcher = config.dispatcher_config();

        assert_eq!(dispatcher.worker_id, "relay-a");
        assert_eq!(dispatcher.batch_size, 25);
        assert_eq!(dispatcher.lease, Duration::from_secs(12));
        assert_eq!(dispatcher.retry.max_attempts, 5);
    }
}
