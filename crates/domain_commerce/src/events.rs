//! Canonical events
//!
//! A canonical event carries a JSON object payload (`data`) plus
//! [`EventMetadata`] for tracing, multi-tenant routing, and idempotency. The
//! outbox persists these verbatim; downstream consumers deduplicate on
//! `metadata.idempotency_key`.
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "type": "ProductUpdated",
//!   "version": "v1",
//!   "data": { "...": "..." },
//!   "metadata": {
//!     "occurred_at": "2025-01-01T00:00:00Z",
//!     "idempotency_key": "uuid",
//!     "trace_id": "uuid",
//!     "tenant_id": "uuid",
//!     "channel_id": "uuid"
//!   }
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use core_kernel::{ChannelId, TenantId};

use crate::dto::{Customer, Order, Product};
use crate::error::CommerceError;

/// Schema version stamped on events when the producer does not set one
pub const DEFAULT_EVENT_VERSION: &str = "v1";

fn default_version() -> String {
    DEFAULT_EVENT_VERSION.to_string()
}

/// Well-known canonical event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalEventType {
    /// Product change observed in a source system
    ProductUpdated,
    /// Order creation emitted by a source system
    OrderCreated,
    /// Customer synchronised across systems
    CustomerSynced,
}

impl CanonicalEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalEventType::ProductUpdated => "ProductUpdated",
            CanonicalEventType::OrderCreated => "OrderCreated",
            CanonicalEventType::CustomerSynced => "CustomerSynced",
        }
    }

    /// Resolves a type string to a well-known type, if it is one
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ProductUpdated" => Some(CanonicalEventType::ProductUpdated),
            "OrderCreated" => Some(CanonicalEventType::OrderCreated),
            "CustomerSynced" => Some(CanonicalEventType::CustomerSynced),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-agnostic event headers for tracing and routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub occurred_at: DateTime<Utc>,
    pub idempotency_key: Uuid,
    pub trace_id: Uuid,
    pub tenant_id: TenantId,
    pub channel_id: ChannelId,
}

impl EventMetadata {
    /// Creates metadata for an event occurring now, with fresh idempotency and trace ids
    pub fn new(tenant_id: TenantId, channel_id: ChannelId) -> Self {
        Self {
            occurred_at: Utc::now(),
            idempotency_key: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            tenant_id,
            channel_id,
        }
    }

    /// Continues an existing trace instead of starting a new one
    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Uses a caller-supplied idempotency key (e.g. derived from the source record)
    pub fn with_idempotency_key(mut self, key: Uuid) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Canonical event with a generic object payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub data: Map<String, Value>,
    pub metadata: EventMetadata,
}

impl CanonicalEvent {
    /// Creates an event with an arbitrary type string
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>, metadata: EventMetadata) -> Self {
        Self {
            event_type: event_type.into(),
            version: default_version(),
            data,
            metadata,
        }
    }

    /// Creates a `ProductUpdated` event carrying the product as payload
    pub fn product_updated(product: &Product, metadata: EventMetadata) -> Result<Self, CommerceError> {
        Self::from_payload(CanonicalEventType::ProductUpdated, product, metadata)
    }

    /// Creates an `OrderCreated` event carrying the order as payload
    pub fn order_created(order: &Order, metadata: EventMetadata) -> Result<Self, CommerceError> {
        Self::from_payload(CanonicalEventType::OrderCreated, order, metadata)
    }

    /// Creates a `CustomerSynced` event carrying the customer as payload
    pub fn customer_synced(customer: &Customer, metadata: EventMetadata) -> Result<Self, CommerceError> {
        Self::from_payload(CanonicalEventType::CustomerSynced, customer, metadata)
    }

    fn from_payload<T: Serialize>(
        kind: CanonicalEventType,
        payload: &T,
        metadata: EventMetadata,
    ) -> Result<Self, CommerceError> {
        let data = match serde_json::to_value(payload)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(Self::new(kind.as_str(), data, metadata))
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Returns the well-known type of this event, if any
    pub fn kind(&self) -> Option<CanonicalEventType> {
        CanonicalEventType::parse(&self.event_type)
    }

    pub fn idempotency_key(&self) -> Uuid {
        self.metadata.idempotency_key
    }

    pub fn tenant_id(&self) -> TenantId {
        self.metadata.tenant_id
    }

    /// Decodes the payload back into a DTO
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, CommerceError> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::CustomerId;

    #[test]
    fn test_type_field_is_renamed_on_the_wire() {
        let event = CanonicalEvent::new(
            "InventoryAdjusted",
            Map::new(),
            EventMetadata::new(TenantId::new(), ChannelId::new()),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "InventoryAdjusted");
        assert_eq!(json["version"], "v1");
        assert!(json.get("event_type").is_none());
        assert_eq!(event.kind(), None);
    }

    #[test]
    fn test_missing_version_defaults_to_v1() {
        let metadata = EventMetadata::new(TenantId::new(), ChannelId::new());
        let json = serde_json::json!({
            "type": "OrderCreated",
            "data": {},
            "metadata": metadata,
        });

        let event: CanonicalEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.version, DEFAULT_EVENT_VERSION);
        assert_eq!(event.kind(), Some(CanonicalEventType::OrderCreated));
    }

    #[test]
    fn test_customer_payload_decodes_back() {
        let customer = Customer::new(CustomerId::new(), "grace@example.com", "Grace", "Hopper");
        let event = CanonicalEvent::customer_synced(
            &customer,
            EventMetadata::new(TenantId::new(), ChannelId::new()),
        )
        .unwrap();

        let decoded: Customer = event.decode().unwrap();
        assert_eq!(decoded, customer);
    }
}
