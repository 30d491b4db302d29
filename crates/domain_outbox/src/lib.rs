//! Transactional Outbox
//!
//! Producers enqueue [`CanonicalEvent`](domain_commerce::CanonicalEvent)s as
//! [`OutboxEvent`] envelopes in the same transaction as their own state
//! change. A [`Dispatcher`] later claims pending envelopes, hands them to an
//! [`EventPublisher`], and records the outcome.
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ──claim──▶ IN_PROGRESS ──mark_as_processed──▶ SENT
//!    │                    │
//!    │                    └──lease expired──▶ PENDING
//!    └──────mark_failed──────▶ FAILED ──requeue (backoff)──▶ PENDING
//! ```
//!
//! Envelopes are never deleted; `SENT` is terminal and `FAILED` envelopes that
//! exhausted the [`RetryPolicy`] stay put as dead letters.
//!
//! # Stores
//!
//! - [`InMemoryOutboxRepository`]: process-local, used by tests and the
//!   `memory` relay backend
//! - `infra_db::PostgresOutboxRepository`: durable, row-locked

pub mod envelope;
pub mod error;
pub mod repository;
pub mod retry;
pub mod memory;
pub mod dispatcher;

pub use envelope::{lease_deadline, OutboxEvent, OutboxEventParts, OutboxStatus, Transition};
pub use error::OutboxError;
pub use repository::{resolve_limit, OutboxRepository, OutboxStats, DEFAULT_PENDING_LIMIT};
pub use retry::RetryPolicy;
pub use memory::{InMemoryOutboxRepository, OutboxUnitOfWork};
pub use dispatcher::{
    Dispatcher, DispatcherConfig, DispatchReport, EventPublisher, PublishError, TracingPublisher,
};
