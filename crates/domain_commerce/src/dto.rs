//! Canonical DTOs for products, variants, customers, and orders
//!
//! The DTOs are immutable once built: fields are private and exposed through
//! getters so that a value handed to an adapter or serialised into an event is
//! exactly the value the caller constructed. They carry no business logic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use core_kernel::{CustomerId, Money, OrderId, ProductId, VariantId};

use crate::error::CommerceError;

/// Implementation-defined order line; adapters normalise as needed
pub type LineItem = Map<String, Value>;

fn non_negative_price(price: &Money) -> Result<(), ValidationError> {
    if price.is_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

/// Product variant (SKU-level granularity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Variant {
    id: VariantId,
    #[validate(length(min = 1, max = 255))]
    sku: String,
    #[validate(custom(function = "non_negative_price"))]
    price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    barcode: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl Variant {
    pub fn new(id: VariantId, sku: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            sku: sku.into(),
            price,
            barcode: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Returns a copy with the barcode set
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Returns a copy with an additional platform attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn price(&self) -> &Money {
        &self.price
    }

    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Canonical product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Product {
    id: ProductId,
    #[validate(length(min = 1))]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    variants: Vec<Variant>,
}

impl Product {
    pub fn new(id: ProductId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            tags: Vec::new(),
            variants: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Validates the product and all of its variants
    pub fn validated(self) -> Result<Self, CommerceError> {
        self.validate()
            .map_err(|e| CommerceError::invalid("product", &e))?;
        Ok(self)
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Finds a variant by SKU
    pub fn variant_by_sku(&self, sku: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.sku == sku)
    }
}

/// Canonical customer identity profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Customer {
    id: CustomerId,
    #[validate(email)]
    email: String,
    first_name: String,
    last_name: String,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn validated(self) -> Result<Self, CommerceError> {
        self.validate()
            .map_err(|e| CommerceError::invalid("customer", &e))?;
        Ok(self)
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Canonical order envelope
///
/// `status` is the platform's lifecycle string (e.g. "created", "paid",
/// "fulfilled"); the core does not interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    #[serde(default)]
    line_items: Vec<LineItem>,
    #[validate(length(min = 1))]
    status: String,
}

impl Order {
    pub fn new(id: OrderId, customer_id: CustomerId, status: impl Into<String>) -> Self {
        Self {
            id,
            customer_id,
            line_items: Vec::new(),
            status: status.into(),
        }
    }

    pub fn with_line_item(mut self, line: LineItem) -> Self {
        self.line_items.push(line);
        self
    }

    pub fn validated(self) -> Result<Self, CommerceError> {
        self.validate()
            .map_err(|e| CommerceError::invalid("order", &e))?;
        Ok(self)
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::CurrencyCode;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_with_variants_validates() {
        let product = Product::new(ProductId::new(), "Mug")
            .with_tag("kitchen")
            .with_variant(Variant::new(
                VariantId::new(),
                "MUG-RED",
                Money::new(dec!(9.99), CurrencyCode::USD),
            ));

        let product = product.validated().unwrap();
        assert!(product.variant_by_sku("MUG-RED").is_some());
        assert!(product.variant_by_sku("MUG-BLUE").is_none());
    }

    #[test]
    fn test_negative_variant_price_is_rejected() {
        let product = Product::new(ProductId::new(), "Mug").with_variant(Variant::new(
            VariantId::new(),
            "MUG-RED",
            Money::new(dec!(-1), CurrencyCode::USD),
        ));

        assert!(product.validated().is_err());
    }

    #[test]
    fn test_customer_email_is_validated() {
        let bad = Customer::new(CustomerId::new(), "not-an-email", "Ada", "Lovelace");
        assert!(bad.validated().is_err());
    }
}
