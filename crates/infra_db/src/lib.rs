//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the integration core, built on SQLx:
//!
//! - [`create_pool`] / [`DatabaseConfig`]: pool construction
//! - [`run_migrations`]: embedded schema migrations
//! - [`PostgresOutboxRepository`]: the durable [`OutboxRepository`](domain_outbox::OutboxRepository)
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresOutboxRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/commerce")).await?;
//! run_migrations(&pool).await?;
//! let outbox = PostgresOutboxRepository::new(pool);
//! ```
//!
//! Queries are built at runtime (`sqlx::query` / `query_as`) so the crate
//! compiles without a live database.

pub mod pool;
pub mod error;
pub mod migrate;
pub mod rows;
pub mod outbox;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, DatabaseConfig};
pub use error::DatabaseError;
pub use migrate::{run_migrations, MIGRATOR};
pub use outbox::PostgresOutboxRepository;
