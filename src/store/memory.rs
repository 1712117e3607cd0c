//! In-process store. One lock guards every table, so each call is a single unit of work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AccountRepository, CartRepository, CatalogRepository, OrderRepository, RemainingStock, Reservation, SeenStatus,
    StoreError, StoreResult,
};
use crate::domain::aggregates::{Admin, Cart, Customer, Order, Product, ProductPatch, Seller};

#[derive(Default)]
pub struct MemoryStore { tables: Mutex<Tables> }

#[derive(Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    sellers: HashMap<Uuid, Seller>,
    admins: HashMap<Uuid, Admin>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: Vec<Order>,
}

fn sorted_by_creation<T>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
    rows
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn insert_customer(&self, customer: Customer) -> StoreResult<Customer> {
        let mut t = self.tables.lock().await;
        if t.customers.values().any(|c| c.email == customer.email) {
            return Err(StoreError::Duplicate("Customer email"));
        }
        if t.customers.values().any(|c| c.phone == customer.phone) {
            return Err(StoreError::Duplicate("Customer phone"));
        }
        t.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.tables.lock().await.customers.get(&id).cloned())
    }

    async fn customer_by_email(&self, email: &str) -> StoreResult<Option<Customer>> {
        Ok(self.tables.lock().await.customers.values().find(|c| c.email == email).cloned())
    }

    async fn save_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        if t.customers.values().any(|c| c.id != customer.id && c.phone == customer.phone) {
            return Err(StoreError::Duplicate("Customer phone"));
        }
        let slot = t.customers.get_mut(&customer.id).ok_or(StoreError::NotFound("Customer"))?;
        *slot = customer.clone();
        Ok(())
    }

    async fn insert_seller(&self, seller: Seller) -> StoreResult<Seller> {
        let mut t = self.tables.lock().await;
        if t.sellers.values().any(|s| s.email == seller.email) { return Err(StoreError::Duplicate("Seller email")); }
        t.sellers.insert(seller.id, seller.clone());
        Ok(seller)
    }

    async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>> {
        Ok(self.tables.lock().await.sellers.get(&id).cloned())
    }

    async fn seller_by_email(&self, email: &str) -> StoreResult<Option<Seller>> {
        Ok(self.tables.lock().await.sellers.values().find(|s| s.email == email).cloned())
    }

    async fn sellers(&self) -> StoreResult<Vec<Seller>> {
        Ok(sorted_by_creation(self.tables.lock().await.sellers.values().cloned(), |s| s.created_at))
    }

    async fn save_seller(&self, seller: &Seller) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        let slot = t.sellers.get_mut(&seller.id).ok_or(StoreError::NotFound("Seller"))?;
        *slot = seller.clone();
        Ok(())
    }

    async fn insert_admin(&self, admin: Admin) -> StoreResult<Admin> {
        let mut t = self.tables.lock().await;
        if t.admins.values().any(|a| a.email == admin.email) { return Err(StoreError::Duplicate("Admin email")); }
        t.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        Ok(self.tables.lock().await.admins.values().find(|a| a.email == email).cloned())
    }

    async fn admin_count(&self) -> StoreResult<u64> { Ok(self.tables.lock().await.admins.len() as u64) }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_product(&self, product: Product) -> StoreResult<Product> {
        self.tables.lock().await.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        Ok(sorted_by_creation(self.tables.lock().await.products.values().cloned(), |p| p.created_at))
    }

    async fn products_by_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>> {
        let t = self.tables.lock().await;
        Ok(sorted_by_creation(t.products.values().filter(|p| p.seller_id == seller_id).cloned(), |p| p.created_at))
    }

    async fn update_product(&self, id: Uuid, patch: &ProductPatch) -> StoreResult<Product> {
        let mut t = self.tables.lock().await;
        let product = t.products.get_mut(&id).ok_or(StoreError::NotFound("Product"))?;
        product.apply(patch);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: Uuid, seller_id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        let owned = t.products.get(&id).is_some_and(|p| p.seller_id == seller_id);
        if owned { t.products.remove(&id); }
        Ok(owned)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn cart_for(&self, customer_id: Uuid) -> StoreResult<Option<Cart>> {
        Ok(self.tables.lock().await.carts.get(&customer_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        let stored = t.carts.get(&cart.customer_id).map_or(0, |c| c.version);
        if stored != cart.version { return Ok(false); }
        let mut saved = cart.clone();
        saved.version += 1;
        t.carts.insert(cart.customer_id, saved);
        Ok(true)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place(&self, order: &Order, reservations: &[Reservation]) -> StoreResult<Vec<RemainingStock>> {
        let mut t = self.tables.lock().await;
        // check everything before touching anything
        for r in reservations {
            let product = t.products.get(&r.product_id).ok_or(StoreError::NotFound("Product"))?;
            if !product.can_supply(r.quantity) {
                return Err(StoreError::InsufficientStock { product_id: product.id, name: product.name.clone() });
            }
        }
        let mut remaining = Vec::with_capacity(reservations.len());
        for r in reservations {
            let product = t.products.get_mut(&r.product_id).ok_or(StoreError::NotFound("Product"))?;
            let left = product.reserve(r.quantity).map_err(|e| StoreError::Backend(e.to_string()))?;
            remaining.push(RemainingStock {
                product_id: product.id, name: product.name.clone(), remaining_stock: left,
            });
        }
        t.orders.push(order.clone());
        Ok(remaining)
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.lock().await.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        let t = self.tables.lock().await;
        Ok(t.orders.iter().rev().filter(|o| o.customer_id == customer_id).cloned().collect())
    }

    async fn orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>> {
        let t = self.tables.lock().await;
        Ok(t.orders.iter().rev().filter(|o| o.seller_id == seller_id).cloned().collect())
    }

    async fn order_count(&self) -> StoreResult<u64> { Ok(self.tables.lock().await.orders.len() as u64) }

    async fn save_status(&self, order: &Order, seen: SeenStatus) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        let slot = t.orders.iter_mut().find(|o| o.id == order.id).ok_or(StoreError::NotFound("Order"))?;
        if SeenStatus::of(slot) != seen { return Ok(false); }
        slot.status = order.status;
        slot.payment_status = order.payment_status;
        slot.updated_at = order.updated_at;
        Ok(true)
    }
}
