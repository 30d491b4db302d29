//! Commerce Ports
//!
//! Every platform adapter (web store, ERP, marketplace) implements the subset
//! of these ports its platform supports. Sync services receive the ports as
//! trait objects and never see platform payloads.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_commerce::ports::CatalogPort;
//! use std::sync::Arc;
//!
//! pub struct CatalogSync {
//!     source: Arc<dyn CatalogPort>,
//!     target: Arc<dyn CatalogPort>,
//! }
//!
//! impl CatalogSync {
//!     pub async fn sync(&self, since: Option<DateTime<Utc>>) -> Result<usize, PortError> {
//!         let products = self.source.pull_products(since).await?;
//!         let count = products.len();
//!         self.target.push_products(products).await?;
//!         Ok(count)
//!     }
//! }
//! ```
//!
//! `since` is exclusive: an adapter returns records changed strictly after it,
//! or everything when it is `None`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, PortError};

use crate::dto::{Customer, Order, Product};

/// Pull/push access to a platform's product catalog
#[async_trait]
pub trait CatalogPort: DomainPort {
    /// Returns products changed after `since`
    async fn pull_products(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Product>, PortError>;

    /// Creates or updates products on the platform
    async fn push_products(&self, products: Vec<Product>) -> Result<(), PortError>;
}

/// Pull/push access to a platform's orders
#[async_trait]
pub trait OrderPort: DomainPort {
    /// Returns orders changed after `since`
    async fn pull_orders(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Order>, PortError>;

    /// Creates or updates orders on the platform
    async fn push_orders(&self, orders: Vec<Order>) -> Result<(), PortError>;
}

/// Read access to a platform's customers
#[async_trait]
pub trait CustomerPort: DomainPort {
    /// Returns customers changed after `since`
    async fn pull_customers(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Customer>, PortError>;
}

/// In-memory platform for testing sync flows without a real store
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::hash::Hash;
    use std::sync::Arc;

    use core_kernel::{
        AdapterHealth, Clock, CustomerId, HealthCheckResult, HealthCheckable, OrderId, ProductId,
        SharedClock, SystemClock,
    };
    use tokio::sync::RwLock;

    /// Records kept with the time they were last written
    #[derive(Debug)]
    struct Table<K, V> {
        rows: Vec<(DateTime<Utc>, V)>,
        index: HashMap<K, usize>,
    }

    impl<K, V> Default for Table<K, V> {
        fn default() -> Self {
            Self {
                rows: Vec::new(),
                index: HashMap::new(),
            }
        }
    }

    impl<K: Eq + Hash, V: Clone> Table<K, V> {
        fn upsert(&mut self, key: K, value: V, at: DateTime<Utc>) {
            match self.index.get(&key) {
                Some(&pos) => self.rows[pos] = (at, value),
                None => {
                    self.index.insert(key, self.rows.len());
                    self.rows.push((at, value));
                }
            }
        }

        fn changed_since(&self, since: Option<DateTime<Utc>>) -> Vec<V> {
            let mut hits: Vec<_> = self
                .rows
                .iter()
                .filter(|(at, _)| since.map_or(true, |s| *at > s))
                .collect();
            hits.sort_by_key(|(at, _)| *at);
            hits.into_iter().map(|(_, v)| v.clone()).collect()
        }
    }

    /// Mock platform implementing all commerce ports
    #[derive(Debug)]
    pub struct MockCommercePlatform {
        clock: SharedClock,
        products: Arc<RwLock<Table<ProductId, Product>>>,
        orders: Arc<RwLock<Table<OrderId, Order>>>,
        customers: Arc<RwLock<Table<CustomerId, Customer>>>,
    }

    impl Default for MockCommercePlatform {
        fn default() -> Self {
            Self::with_clock(SystemClock::shared())
        }
    }

    impl MockCommercePlatform {
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a mock that timestamps writes with `clock`
        pub fn with_clock(clock: SharedClock) -> Self {
            Self {
                clock,
                products: Arc::default(),
                orders: Arc::default(),
                customers: Arc::default(),
            }
        }

        /// Adds or replaces a customer as if it changed on the platform now
        pub async fn upsert_customer(&self, customer: Customer) {
            let now = self.clock.now();
            self.customers.write().await.upsert(customer.id(), customer, now);
        }

        pub async fn product_count(&self) -> usize {
            self.products.read().await.rows.len()
        }

        pub async fn order_count(&self) -> usize {
            self.orders.read().await.rows.len()
        }
    }

    impl DomainPort for MockCommercePlatform {}

    #[async_trait]
    impl HealthCheckable for MockCommercePlatform {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-commerce-platform".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: self.clock.now(),
            }
        }
    }

    #[async_trait]
    impl CatalogPort for MockCommercePlatform {
        async fn pull_products(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Product>, PortError> {
            Ok(self.products.read().await.changed_since(since))
        }

        async fn push_products(&self, products: Vec<Product>) -> Result<(), PortError> {
            let now = self.clock.now();
            let mut table = self.products.write().await;
            for product in products {
                table.upsert(product.id(), product, now);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OrderPort for MockCommercePlatform {
        async fn pull_orders(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Order>, PortError> {
            Ok(self.orders.read().await.changed_since(since))
        }

        async fn push_orders(&self, orders: Vec<Order>) -> Result<(), PortError> {
            let now = self.clock.now();
            let mut table = self.orders.write().await;
            for order in orders {
                table.upsert(order.id(), order, now);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CustomerPort for MockCommercePlatform {
        async fn pull_customers(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Customer>, PortError> {
            Ok(self.customers.read().await.changed_since(since))
        }
    }
}
