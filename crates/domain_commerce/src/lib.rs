//! Canonical Commerce Domain
//!
//! This crate defines the shapes exchanged between platform adapters
//! (web stores, ERPs) and the integration core:
//!
//! - **DTOs**: immutable canonical products, variants, customers, and orders
//! - **Events**: the canonical event envelope payload with routing and
//!   idempotency metadata, as persisted by the outbox
//! - **Ports**: the pull/push operations every platform adapter implements
//!
//! Mapping platform payloads onto these shapes is the job of the adapters and
//! is not part of this crate.
//!
//! # Examples
//!
//! ```rust
//! use core_kernel::{ChannelId, CustomerId, TenantId};
//! use domain_commerce::{CanonicalEvent, CanonicalEventType, Customer, EventMetadata};
//!
//! let customer = Customer::new(CustomerId::new(), "ada@example.com", "Ada", "Lovelace");
//! let metadata = EventMetadata::new(TenantId::new(), ChannelId::new());
//! let event = CanonicalEvent::customer_synced(&customer, metadata).unwrap();
//!
//! assert_eq!(event.kind(), Some(CanonicalEventType::CustomerSynced));
//! ```

pub mod dto;
pub mod events;
pub mod ports;
pub mod error;

pub use dto::{Product, Variant, Customer, Order, LineItem};
pub use events::{CanonicalEvent, CanonicalEventType, EventMetadata, DEFAULT_EVENT_VERSION};
pub use ports::{CatalogPort, OrderPort, CustomerPort};
pub use error::CommerceError;
