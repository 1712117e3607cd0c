//! Persistence ports and their adapters

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    Admin, Cart, Customer, FulfillmentStatus, Order, PaymentStatus, Product, ProductPatch, Seller,
};
use crate::domain::value_objects::Quantity;
use crate::EcommerceError;

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub(crate) mod test_db;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Insufficient stock for product {name}")]
    InsufficientStock { product_id: Uuid, name: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for EcommerceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientStock { name, .. } => EcommerceError::InsufficientStock { product: name },
            StoreError::NotFound(what) => EcommerceError::NotFound(what.to_string()),
            StoreError::Duplicate(what) => EcommerceError::Conflict(format!("{what} already exists")),
            StoreError::Backend(msg) => EcommerceError::Internal(msg),
        }
    }
}

/// Units to take out of one product's stock as part of a purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation { pub product_id: Uuid, pub quantity: Quantity }

/// Stock left on a product right after a reservation committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingStock { pub product_id: Uuid, pub name: String, pub remaining_stock: i32 }

/// Status pair an order update was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeenStatus { pub status: FulfillmentStatus, pub payment_status: PaymentStatus }

impl SeenStatus {
    pub fn of(order: &Order) -> Self { Self { status: order.status, payment_status: order.payment_status } }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn insert_customer(&self, customer: Customer) -> StoreResult<Customer>;
    async fn customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
    async fn customer_by_email(&self, email: &str) -> StoreResult<Option<Customer>>;
    async fn save_customer(&self, customer: &Customer) -> StoreResult<()>;

    async fn insert_seller(&self, seller: Seller) -> StoreResult<Seller>;
    async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>>;
    async fn seller_by_email(&self, email: &str) -> StoreResult<Option<Seller>>;
    async fn sellers(&self) -> StoreResult<Vec<Seller>>;
    async fn save_seller(&self, seller: &Seller) -> StoreResult<()>;

    async fn insert_admin(&self, admin: Admin) -> StoreResult<Admin>;
    async fn admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>>;
    async fn admin_count(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_product(&self, product: Product) -> StoreResult<Product>;
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn products(&self) -> StoreResult<Vec<Product>>;
    async fn products_by_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>>;
    /// Writes only the fields `patch` sets, against the stored row. Returns the product as saved.
    async fn update_product(&self, id: Uuid, patch: &ProductPatch) -> StoreResult<Product>;
    /// Deletes the product only if `seller_id` owns it. Returns whether anything was deleted.
    async fn delete_product(&self, id: Uuid, seller_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn cart_for(&self, customer_id: Uuid) -> StoreResult<Option<Cart>>;
    /// Saves `cart` if nobody else saved it since it was read (its `version` still matches).
    /// Returns `false` when it was stale and nothing was written.
    async fn save_cart(&self, cart: &Cart) -> StoreResult<bool>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Takes every reservation out of stock and records `order`, as one unit of work.
    ///
    /// Each decrement only happens if the product still has enough stock. If any of them cannot,
    /// nothing is written and [`StoreError::InsufficientStock`] names the product.
    async fn place(&self, order: &Order, reservations: &[Reservation]) -> StoreResult<Vec<RemainingStock>>;
    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>>;
    async fn orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>>;
    async fn order_count(&self) -> StoreResult<u64>;
    /// Writes both status fields of `order`, but only if the stored ones still equal `seen`.
    /// Returns `false` when another update got there first.
    async fn save_status(&self, order: &Order, seen: SeenStatus) -> StoreResult<bool>;
}

/// Every repository the services need, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self { Self::from_store(Arc::new(MemoryStore::default())) }

    pub fn postgres(pool: sqlx::PgPool) -> Self { Self::from_store(Arc::new(PgStore::new(pool))) }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AccountRepository + CatalogRepository + CartRepository + OrderRepository + 'static,
    {
        Self { accounts: store.clone(), catalog: store.clone(), carts: store.clone(), orders: store }
    }
}
