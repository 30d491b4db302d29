//! Pre-built Test Fixtures
//!
//! Fixed values for assertions that compare against literals, and
//! `fake`-backed values for tests that only need something plausible.

use chrono::{DateTime, TimeZone, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use core_kernel::{
    ChannelId, CurrencyCode, CustomerId, ManualClock, Money, OrderId, ProductId, TenantId, VariantId,
};
use domain_commerce::{Customer, EventMetadata, Order, Product, Variant};

/// Fixed instants for clock-driven tests
pub struct TimeFixtures;

impl TimeFixtures {
    /// 2025-06-01 09:00:00 UTC; whole seconds so it survives a database round trip
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn clock() -> ManualClock {
        ManualClock::new(Self::epoch())
    }
}

/// Tenant and channel pairs
pub struct ScopeFixtures;

impl ScopeFixtures {
    pub fn metadata() -> EventMetadata {
        EventMetadata::new(TenantId::new(), ChannelId::new())
    }

    pub fn metadata_for(tenant_id: TenantId) -> EventMetadata {
        EventMetadata::new(tenant_id, ChannelId::new())
    }
}

/// Canonical DTOs filled with fake data
pub struct CommerceFixtures;

impl CommerceFixtures {
    pub fn price() -> Money {
        let minor: i64 = (100..500_000).fake();
        Money::from_minor(minor, CurrencyCode::USD)
    }

    pub fn variant() -> Variant {
        let sku = format!("SKU-{}", (10_000..99_999).fake::<u32>());
        Variant::new(VariantId::new(), sku, Self::price())
            .with_attribute("color", Word().fake::<String>())
    }

    pub fn product() -> Product {
        let title: Vec<String> = Words(2..4).fake();
        Product::new(ProductId::new(), title.join(" "))
            .with_description(Sentence(4..10).fake::<String>())
            .with_tag(Word().fake::<String>())
            .with_variant(Self::variant())
    }

    pub fn customer() -> Customer {
        Customer::new(
            CustomerId::new(),
            SafeEmail().fake::<String>(),
            FirstName().fake::<String>(),
            LastName().fake::<String>(),
        )
    }

    pub fn order() -> Order {
        Order::new(OrderId::new(), CustomerId::new(), "paid").with_line_item(Self::line_item())
    }

    pub fn line_item() -> Map<String, Value> {
        let quantity: u32 = (1..10).fake();
        let unit_price = Decimal::new((100..10_000).fake::<i64>(), 2);
        let mut line = Map::new();
        line.insert("sku".to_string(), json!(format!("SKU-{}", (10_000..99_999).fake::<u32>())));
        line.insert("quantity".to_string(), json!(quantity));
        line.insert("unit_price".to_string(), json!(unit_price.to_string()));
        line
    }
}
