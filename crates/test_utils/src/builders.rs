//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use core_kernel::{ChannelId, TenantId};
use domain_commerce::{CanonicalEvent, CanonicalEventType, EventMetadata, DEFAULT_EVENT_VERSION};

/// Builder for canonical events
pub struct CanonicalEventBuilder {
    event_type: String,
    version: String,
    data: Map<String, Value>,
    tenant_id: TenantId,
    channel_id: ChannelId,
    idempotency_key: Option<Uuid>,
    trace_id: Option<Uuid>,
    occurred_at: Option<DateTime<Utc>>,
}

impl Default for CanonicalEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalEventBuilder {
    /// Creates an `OrderCreated` event with an empty payload
    pub fn new() -> Self {
        Self {
            event_type: CanonicalEventType::OrderCreated.as_str().to_string(),
            version: DEFAULT_EVENT_VERSION.to_string(),
            data: Map::new(),
            tenant_id: TenantId::new(),
            channel_id: ChannelId::new(),
            idempotency_key: None,
            trace_id: None,
            occurred_at: None,
        }
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds one key to the payload
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_channel(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn with_idempotency_key(mut self, key: Uuid) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn build(self) -> CanonicalEvent {
        let mut metadata = EventMetadata::new(self.tenant_id, self.channel_id);
        if let Some(key) = self.idempotency_key {
            metadata = metadata.with_idempotency_key(key);
        }
        if let Some(trace_id) = self.trace_id {
            metadata = metadata.with_trace_id(trace_id);
        }
        if let Some(at) = self.occurred_at {
            metadata = metadata.with_occurred_at(at);
        }
        CanonicalEvent::new(self.event_type, self.data, metadata).with_version(self.version)
    }

    /// Builds `count` events of the same shape, each tagged with its index
    pub fn build_many(self, count: usize) -> Vec<CanonicalEvent> {
        let template = self.build();
        (0..count)
            .map(|index| {
                let mut event = template.clone();
                event.data.insert("index".to_string(), Value::from(index));
                event.metadata.idempotency_key = Uuid::new_v4();
                event
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let event = CanonicalEventBuilder::new().build();

        assert_eq!(event.kind(), Some(CanonicalEventType::OrderCreated));
        assert_eq!(event.version, DEFAULT_EVENT_VERSION);
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_build_many_tags_each_event() {
        let tenant = TenantId::new();
        let events = CanonicalEventBuilder::new()
            .with_tenant(tenant)
            .with_field("sku", "SKU-1")
            .build_many(3);

        assert_eq!(events.len(), 3);
        for (index, event) in events.iter().enumerate() {
            assert_eq!(event.data["index"], Value::from(index));
            assert_eq!(event.data["sku"], "SKU-1");
            assert_eq!(event.tenant_id(), tenant);
        }
        assert_ne!(events[0].idempotency_key(), events[1].idempotency_key());
    }
}
