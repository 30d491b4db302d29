//! Explicit composition of the relay's collaborators
//!
//! The backend is chosen once at startup and handed to the dispatcher as an
//! `Arc<dyn OutboxRepository>`; nothing is looked up at runtime.

use std::sync::Arc;

use tracing::{info, warn};

use core_kernel::{HealthCheckResult, HealthCheckable};
use domain_outbox::{
    Dispatcher, EventPublisher, InMemoryOutboxRepository, OutboxRepository,
};
use infra_db::{create_pool, run_migrations, DatabasePool, PostgresOutboxRepository};

use crate::config::{OutboxBackend, RelayConfig};
use crate::error::RelayError;

/// Wired outbox store plus whatever resources back it
pub struct OutboxServices {
    backend: OutboxBackend,
    repository: Arc<dyn OutboxRepository>,
    pool: Option<DatabasePool>,
}

impl OutboxServices {
    /// Builds the store selected by `config.backend`
    ///
    /// The postgres backend connects and applies pending migrations before
    /// returning.
    pub async fn build(config: &RelayConfig) -> Result<Self, RelayError> {
        match config.backend {
            OutboxBackend::Memory => {
                warn!("Using in-memory outbox; envelopes are lost on restart");
                Ok(Self::in_memory(InMemoryOutboxRepository::new()))
            }
            OutboxBackend::Postgres => {
                let pool = create_pool(config.database_config()).await?;
                run_migrations(&pool).await?;
                info!("Outbox migrations applied");
                Ok(Self {
                    backend: OutboxBackend::Postgres,
                    repository: Arc::new(PostgresOutboxRepository::new(pool.clone())),
                    pool: Some(pool),
                })
            }
        }
    }

    pub fn in_memory(repository: InMemoryOutboxRepository) -> Self {
        Self {
            backend: OutboxBackend::Memory,
            repository: Arc::new(repository),
            pool: None,
        }
    }

    pub fn backend(&self) -> OutboxBackend {
        self.backend
    }

    pub fn repository(&self) -> Arc<dyn OutboxRepository> {
        Arc::clone(&self.repository)
    }

    /// Creates a dispatcher over the wired store
    pub fn dispatcher<P: EventPublisher>(&self, publisher: P, config: &RelayConfig) -> Dispatcher<P> {
        Dispatcher::new(self.repository(), publisher, config.dispatcher_config())
    }

    pub async fn health(&self) -> HealthCheckResult {
        self.repository.health_check().await
    }

    /// Closes the connection pool, if any
    pub async fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
            info!("Database pool closed");
        }
    }
}
