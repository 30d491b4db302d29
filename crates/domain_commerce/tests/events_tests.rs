//! Tests for canonical events

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{ChannelId, CurrencyCode, CustomerId, Money, OrderId, ProductId, TenantId, VariantId};

use domain_commerce::{
    CanonicalEvent, CanonicalEventType, EventMetadata, Order, Product, Variant,
    DEFAULT_EVENT_VERSION,
};

fn metadata() -> EventMetadata {
    EventMetadata::new(TenantId::new(), ChannelId::new())
}

#[test]
fn test_product_updated_event() {
    let product = Product::new(ProductId::new(), "Mug").with_variant(Variant::new(
        VariantId::new(),
        "MUG-RED",
        Money::new(dec!(9.99), CurrencyCode::USD),
    ));

    let event = CanonicalEvent::product_updated(&product, metadata()).unwrap();

    assert_eq!(event.event_type, "ProductUpdated");
    assert_eq!(event.kind(), Some(CanonicalEventType::ProductUpdated));
    assert_eq!(event.version, DEFAULT_EVENT_VERSION);
    assert_eq!(event.data["title"], "Mug");

    let decoded: Product = event.decode().unwrap();
    assert_eq!(decoded, product);
}

#[test]
fn test_order_created_event_carries_routing_metadata() {
    let tenant = TenantId::new();
    let channel = ChannelId::new();
    let order = Order::new(OrderId::new(), CustomerId::new(), "created");

    let event = CanonicalEvent::order_created(&order, EventMetadata::new(tenant, channel)).unwrap();

    assert_eq!(event.tenant_id(), tenant);
    assert_eq!(event.metadata.channel_id, channel);
    assert_eq!(event.data["status"], "created");
}

#[test]
fn test_metadata_overrides() {
    let trace = Uuid::new_v4();
    let key = Uuid::new_v4();
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let metadata = metadata()
        .with_trace_id(trace)
        .with_idempotency_key(key)
        .with_occurred_at(at);

    assert_eq!(metadata.trace_id, trace);
    assert_eq!(metadata.idempotency_key, key);
    assert_eq!(metadata.occurred_at, at);
}

#[test]
fn test_event_json_round_trip_preserves_payload() {
    let mut data = serde_json::Map::new();
    data.insert("sku".into(), "MUG-RED".into());
    data.insert("delta".into(), (-3).into());
    let event = CanonicalEvent::new("InventoryAdjusted", data, metadata()).with_version("v2");

    let text = serde_json::to_string(&event).unwrap();
    let back: CanonicalEvent = serde_json::from_str(&text).unwrap();

    assert_eq!(back, event);
    assert_eq!(back.version, "v2");
    assert_eq!(back.kind(), None);
}

#[test]
fn test_event_type_display() {
    assert_eq!(CanonicalEventType::CustomerSynced.to_string(), "CustomerSynced");
    assert_eq!(CanonicalEventType::parse("OrderCreated"), Some(CanonicalEventType::OrderCreated));
    assert_eq!(CanonicalEventType::parse("orderCreated"), None);
}

proptest! {
    #[test]
    fn fresh_metadata_never_reuses_idempotency_keys(n in 2usize..50) {
        let keys: std::collections::HashSet<_> =
            (0..n).map(|_| metadata().idempotency_key).collect();
        prop_assert_eq!(keys.len(), n);
    }
}
