//! Outbox relay
//!
//! Loads configuration, installs tracing, wires the selected outbox store and
//! drives a [`domain_outbox::Dispatcher`] until shutdown. The binary in
//! `src/bin/outbox_relay.rs` is a thin shell over this crate.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod wiring;

pub use config::{LogFormat, OutboxBackend, RelayConfig, ENV_PREFIX};
pub use error::RelayError;
pub use telemetry::init_tracing;
pub use wiring::OutboxServices;
