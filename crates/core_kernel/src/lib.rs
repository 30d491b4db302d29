//! Core Kernel - Foundational types shared by the commerce integration crates
//!
//! This crate provides the building blocks used across all domain modules:
//! - Strongly-typed identifiers for tenants, channels, and catalog entities
//! - Money with precise decimal arithmetic and ISO 4217 currency codes
//! - A clock abstraction so time-dependent logic can be tested deterministically
//! - Port error and health types for the hexagonal boundary

pub mod money;
pub mod clock;
pub mod identifiers;
pub mod ports;

pub use money::{Money, CurrencyCode, MoneyError};
pub use clock::{Clock, SystemClock, ManualClock, SharedClock};
pub use identifiers::{
    TenantId, ChannelId, ProductId, VariantId, CustomerId, OrderId, OutboxEventId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
