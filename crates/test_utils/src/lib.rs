//! Test Utilities Crate
//!
//! Shared test infrastructure for the commerce integration core.
//!
//! # Modules
//!
//! - `fixtures`: Fake-backed DTOs and metadata
//! - `builders`: Builder for canonical events
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Assertion helpers for outbox envelopes
//! - `generators`: Property-based test data generators
//! - `contract`: Behavioural suite every `OutboxRepository` must pass
//! - `publishers`: Scriptable `EventPublisher` doubles

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;
pub mod contract;
pub mod publishers;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
pub use publishers::*;
