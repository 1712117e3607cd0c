//! Postgres adapter (sqlx). Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    AccountRepository, CartRepository, CatalogRepository, OrderRepository, RemainingStock, Reservation, SeenStatus,
    StoreError, StoreResult,
};
use crate::domain::aggregates::{
    Address, Admin, Cart, CartItem, Customer, LineItem, Order, Product, ProductPatch, Seller,
};
use crate::domain::value_objects::{Quantity, ShippingAddress};

/// Attempts per purchase before a serialization failure or deadlock is reported.
const PLACE_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn backend(e: sqlx::Error) -> StoreError { StoreError::Backend(e.to_string()) }

fn sql_state(e: &sqlx::Error) -> Option<String> {
    e.as_database_error().and_then(|d| d.code()).map(|c| c.into_owned())
}

fn unique_or_backend(what: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| match sql_state(&e).as_deref() {
        Some("23505") => StoreError::Duplicate(what),
        _ => backend(e),
    }
}

fn corrupt(what: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {what} in storage: {value}"))
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid, name: String, email: String, phone: String, password_hash: String,
    addresses: Json<Vec<Address>>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(r: CustomerRow) -> Self {
        Self {
            id: r.id, name: r.name, email: r.email, phone: r.phone, password_hash: r.password_hash,
            addresses: r.addresses.0, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SellerRow {
    id: Uuid, owner_name: String, contact_no: String, shop_name: String, email: String, password_hash: String,
    seller_address: String, shop_website: Option<String>, gst_number: String, id_proof: String,
    years_in_business: i32, customer_support: String, account_status: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<SellerRow> for Seller {
    type Error = StoreError;
    fn try_from(r: SellerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            account_status: r.account_status.parse().map_err(|_| corrupt("seller status", &r.account_status))?,
            id: r.id, owner_name: r.owner_name, contact_no: r.contact_no, shop_name: r.shop_name, email: r.email,
            password_hash: r.password_hash, seller_address: r.seller_address, shop_website: r.shop_website,
            gst_number: r.gst_number, id_proof: r.id_proof, years_in_business: r.years_in_business,
            customer_support: r.customer_support, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AdminRow { id: Uuid, email: String, password_hash: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

impl From<AdminRow> for Admin {
    fn from(r: AdminRow) -> Self {
        Self {
            id: r.id, email: r.email, password_hash: r.password_hash, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_id: Uuid, seller_id: Uuid, total_amount: Decimal, shipping_address: Json<ShippingAddress>,
    payment_status: String, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { order_id: Uuid, product_id: Uuid, name: String, unit_price: Decimal, quantity: i32 }

#[derive(sqlx::FromRow)]
struct CartItemRow { id: Uuid, product_id: Uuid, quantity: i32, added_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct CartRow { id: Uuid, customer_id: Uuid, version: i64, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

fn quantity(raw: i32) -> StoreResult<Quantity> {
    u32::try_from(raw).ok().and_then(|q| Quantity::new(q).ok()).ok_or_else(|| corrupt("quantity", raw))
}

const SELLER_COLUMNS: &str = "id, owner_name, contact_no, shop_name, email, password_hash, seller_address, \
    shop_website, gst_number, id_proof, years_in_business, customer_support, account_status, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, customer_id, seller_id, total_amount, shipping_address, payment_status, status, created_at, updated_at";

const RESERVE_STOCK: &str = "UPDATE products SET stock = stock - $2, updated_at = NOW() \
    WHERE id = $1 AND stock >= $2 RETURNING name, stock";
const INSERT_ORDER: &str = "INSERT INTO orders \
    (id, customer_id, seller_id, total_amount, shipping_address, payment_status, status, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";
const INSERT_ORDER_ITEM: &str = "INSERT INTO order_items (order_id, position, product_id, name, unit_price, quantity) \
    VALUES ($1, $2, $3, $4, $5, $6)";
const INSERT_CUSTOMER: &str = "INSERT INTO customers \
    (id, name, email, phone, password_hash, addresses, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";
const UPDATE_CUSTOMER: &str = "UPDATE customers \
    SET name = $2, phone = $3, password_hash = $4, addresses = $5, updated_at = $6 WHERE id = $1";
const INSERT_PRODUCT: &str = "INSERT INTO products \
    (id, seller_id, name, description, price, category, stock, images, brand, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *";
// unset patch fields arrive as NULL and keep the stored value
const PATCH_PRODUCT: &str = "UPDATE products SET \
    name = COALESCE($2, name), description = COALESCE($3, description), price = COALESCE($4, price), \
    category = COALESCE($5, category), stock = COALESCE($6, stock), images = COALESCE($7, images), \
    brand = COALESCE($8, brand), updated_at = NOW() \
    WHERE id = $1 RETURNING *";
const INSERT_CART_ITEM: &str = "INSERT INTO cart_items (id, cart_id, product_id, quantity, added_at) \
    VALUES ($1, $2, $3, $4, $5)";
const SAVE_STATUS: &str = "UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 \
    WHERE id = $1 AND status = $5 AND payment_status = $6";

impl PgStore {
    async fn seller_where(&self, clause: &str, bind: impl ToString) -> StoreResult<Option<Seller>> {
        let sql = format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE {clause}");
        let row = sqlx::query_as::<_, SellerRow>(&sql)
            .bind(bind.to_string())
            .fetch_optional(&self.pool).await.map_err(backend)?;
        row.map(Seller::try_from).transpose()
    }

    /// Loads the line items for `rows` and assembles full orders, keeping row order.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT order_id, product_id, name, unit_price, quantity FROM order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids).fetch_all(&self.pool).await.map_err(backend)?;

        let mut by_order: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for i in items {
            let line = LineItem {
                product_id: i.product_id, name: i.name, unit_price: i.unit_price, quantity: quantity(i.quantity)?,
            };
            by_order.entry(i.order_id).or_default().push(line);
        }

        rows.into_iter()
            .map(|r| -> StoreResult<Order> {
                Ok(Order {
                    products: by_order.remove(&r.id).unwrap_or_default(),
                    payment_status: r.payment_status.parse()
                        .map_err(|_| corrupt("payment status", &r.payment_status))?,
                    status: r.status.parse().map_err(|_| corrupt("order status", &r.status))?,
                    id: r.id, customer_id: r.customer_id, seller_id: r.seller_id, total_amount: r.total_amount,
                    shipping_address: r.shipping_address.0, created_at: r.created_at, updated_at: r.updated_at,
                })
            })
            .collect()
    }

    async fn orders_where(&self, clause: &str, id: Uuid) -> StoreResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {clause} ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_all(&self.pool).await.map_err(backend)?;
        self.hydrate(rows).await
    }

    async fn try_place(&self, order: &Order, reservations: &[Reservation]) -> Result<Vec<RemainingStock>, Attempt> {
        let mut ordered = reservations.to_vec();
        ordered.sort_by_key(|r| r.product_id);

        let mut tx = self.pool.begin().await?;
        let mut remaining = Vec::with_capacity(ordered.len());
        for r in &ordered {
            let row: Option<(String, i32)> = sqlx::query_as(RESERVE_STOCK)
                .bind(r.product_id).bind(r.quantity.as_stock())
                .fetch_optional(&mut *tx).await?;

            match row {
                Some((name, stock)) => {
                    remaining.push(RemainingStock { product_id: r.product_id, name, remaining_stock: stock });
                }
                None => {
                    let name: Option<(String,)> = sqlx::query_as("SELECT name FROM products WHERE id = $1")
                        .bind(r.product_id).fetch_optional(&mut *tx).await?;
                    tx.rollback().await?;
                    return Err(Attempt::Fail(match name {
                        Some((name,)) => StoreError::InsufficientStock { product_id: r.product_id, name },
                        None => StoreError::NotFound("Product"),
                    }));
                }
            }
        }

        sqlx::query(INSERT_ORDER)
            .bind(order.id).bind(order.customer_id).bind(order.seller_id).bind(order.total_amount)
            .bind(Json(&order.shipping_address)).bind(order.payment_status.as_str()).bind(order.status.as_str())
            .bind(order.created_at).bind(order.updated_at)
            .execute(&mut *tx).await?;

        for (position, item) in order.products.iter().enumerate() {
            sqlx::query(INSERT_ORDER_ITEM)
                .bind(order.id).bind(position as i32).bind(item.product_id).bind(&item.name)
                .bind(item.unit_price).bind(item.quantity.as_stock())
                .execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(remaining)
    }
}

/// Outcome of one purchase transaction attempt.
enum Attempt {
    Retry(sqlx::Error),
    Fail(StoreError),
}

impl From<sqlx::Error> for Attempt {
    fn from(e: sqlx::Error) -> Self {
        match sql_state(&e).as_deref() {
            Some("40001") | Some("40P01") => Self::Retry(e),
            _ => Self::Fail(backend(e)),
        }
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn insert_customer(&self, c: Customer) -> StoreResult<Customer> {
        sqlx::query(INSERT_CUSTOMER)
            .bind(c.id).bind(&c.name).bind(&c.email).bind(&c.phone).bind(&c.password_hash).bind(Json(&c.addresses))
            .bind(c.created_at).bind(c.updated_at)
            .execute(&self.pool).await.map_err(unique_or_backend("Customer"))?;
        Ok(c)
    }

    async fn customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await.map_err(backend)?;
        Ok(row.map(Customer::from))
    }

    async fn customer_by_email(&self, email: &str) -> StoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE email = $1")
            .bind(email).fetch_optional(&self.pool).await.map_err(backend)?;
        Ok(row.map(Customer::from))
    }

    async fn save_customer(&self, c: &Customer) -> StoreResult<()> {
        let done = sqlx::query(UPDATE_CUSTOMER)
            .bind(c.id).bind(&c.name).bind(&c.phone).bind(&c.password_hash).bind(Json(&c.addresses)).bind(c.updated_at)
            .execute(&self.pool).await.map_err(unique_or_backend("Customer phone"))?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("Customer")); }
        Ok(())
    }

    async fn insert_seller(&self, s: Seller) -> StoreResult<Seller> {
        let sql = format!(
            "INSERT INTO sellers ({SELLER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        );
        sqlx::query(&sql)
            .bind(s.id).bind(&s.owner_name).bind(&s.contact_no).bind(&s.shop_name).bind(&s.email).bind(&s.password_hash)
            .bind(&s.seller_address).bind(&s.shop_website).bind(&s.gst_number).bind(&s.id_proof)
            .bind(s.years_in_business).bind(&s.customer_support).bind(s.account_status.as_str())
            .bind(s.created_at).bind(s.updated_at)
            .execute(&self.pool).await.map_err(unique_or_backend("Seller"))?;
        Ok(s)
    }

    async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>> { self.seller_where("id = $1::uuid", id).await }

    async fn seller_by_email(&self, email: &str) -> StoreResult<Option<Seller>> {
        self.seller_where("email = $1", email).await
    }

    async fn sellers(&self) -> StoreResult<Vec<Seller>> {
        let sql = format!("SELECT {SELLER_COLUMNS} FROM sellers ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, SellerRow>(&sql).fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter().map(Seller::try_from).collect()
    }

    async fn save_seller(&self, s: &Seller) -> StoreResult<()> {
        let done = sqlx::query("UPDATE sellers SET account_status = $2, updated_at = $3 WHERE id = $1")
            .bind(s.id).bind(s.account_status.as_str()).bind(s.updated_at)
            .execute(&self.pool).await.map_err(backend)?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound("Seller")); }
        Ok(())
    }

    async fn insert_admin(&self, a: Admin) -> StoreResult<Admin> {
        sqlx::query("INSERT INTO admins (id, email, password_hash, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(a.id).bind(&a.email).bind(&a.password_hash).bind(a.created_at).bind(a.updated_at)
            .execute(&self.pool).await.map_err(unique_or_backend("Admin"))?;
        Ok(a)
    }

    async fn admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        let row = sqlx::query_as::<_, AdminRow>("SELECT * FROM admins WHERE email = $1")
            .bind(email).fetch_optional(&self.pool).await.map_err(backend)?;
        Ok(row.map(Admin::from))
    }

    async fn admin_count(&self) -> StoreResult<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins").fetch_one(&self.pool).await.map_err(backend)?;
        Ok(n.max(0) as u64)
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn insert_product(&self, p: Product) -> StoreResult<Product> {
        sqlx::query_as::<_, Product>(INSERT_PRODUCT)
            .bind(p.id).bind(p.seller_id).bind(&p.name).bind(&p.description).bind(p.price).bind(&p.category)
            .bind(p.stock).bind(&p.images).bind(&p.brand).bind(p.created_at).bind(p.updated_at)
            .fetch_one(&self.pool).await.map_err(backend)
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await.map_err(backend)
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
            .fetch_all(&self.pool).await.map_err(backend)
    }

    async fn products_by_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE seller_id = $1 ORDER BY created_at DESC")
            .bind(seller_id).fetch_all(&self.pool).await.map_err(backend)
    }

    async fn update_product(&self, id: Uuid, patch: &ProductPatch) -> StoreResult<Product> {
        sqlx::query_as::<_, Product>(PATCH_PRODUCT)
            .bind(id).bind(patch.name.as_deref()).bind(patch.description.as_deref()).bind(patch.price)
            .bind(patch.category.as_deref()).bind(patch.stock).bind(patch.images.as_deref())
            .bind(patch.brand.as_deref())
            .fetch_optional(&self.pool).await.map_err(backend)?
            .ok_or(StoreError::NotFound("Product"))
    }

    async fn delete_product(&self, id: Uuid, seller_id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1 AND seller_id = $2")
            .bind(id).bind(seller_id).execute(&self.pool).await.map_err(backend)?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn cart_for(&self, customer_id: Uuid) -> StoreResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, CartRow>(
            "SELECT id, customer_id, version, created_at, updated_at FROM carts WHERE customer_id = $1",
        )
        .bind(customer_id).fetch_optional(&self.pool).await.map_err(backend)?;
        let Some(cart) = cart else { return Ok(None) };

        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT id, product_id, quantity, added_at FROM cart_items WHERE cart_id = $1 ORDER BY added_at",
        )
        .bind(cart.id).fetch_all(&self.pool).await.map_err(backend)?;
        let items = rows.into_iter()
            .map(|r| -> StoreResult<CartItem> {
                let quantity = quantity(r.quantity)?;
                Ok(CartItem { id: r.id, product_id: r.product_id, quantity, added_at: r.added_at })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(Cart {
            id: cart.id, customer_id: cart.customer_id, items, version: cart.version,
            created_at: cart.created_at, updated_at: cart.updated_at,
        }))
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let claimed = if cart.version == 0 {
            sqlx::query(
                "INSERT INTO carts (id, customer_id, version, created_at, updated_at) VALUES ($1, $2, 1, $3, $4) \
                 ON CONFLICT (customer_id) DO NOTHING",
            )
            .bind(cart.id).bind(cart.customer_id).bind(cart.created_at).bind(cart.updated_at)
            .execute(&mut *tx).await.map_err(backend)?
        } else {
            sqlx::query("UPDATE carts SET version = version + 1, updated_at = $3 WHERE id = $1 AND version = $2")
                .bind(cart.id).bind(cart.version).bind(cart.updated_at)
                .execute(&mut *tx).await.map_err(backend)?
        };
        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id).execute(&mut *tx).await.map_err(backend)?;
        for item in &cart.items {
            sqlx::query(INSERT_CART_ITEM)
                .bind(item.id).bind(cart.id).bind(item.product_id).bind(item.quantity.as_stock()).bind(item.added_at)
                .execute(&mut *tx).await.map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(true)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn place(&self, order: &Order, reservations: &[Reservation]) -> StoreResult<Vec<RemainingStock>> {
        let mut attempt = 1;
        loop {
            match self.try_place(order, reservations).await {
                Ok(remaining) => return Ok(remaining),
                Err(Attempt::Fail(e)) => return Err(e),
                Err(Attempt::Retry(e)) if attempt < PLACE_ATTEMPTS => {
                    tracing::warn!(
                        order_id = %order.id, attempt, error = %e, "purchase transaction conflicted, retrying"
                    );
                    attempt += 1;
                }
                Err(Attempt::Retry(e)) => return Err(backend(e)),
            }
        }
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders_where("id = $1", id).await?.into_iter().next())
    }

    async fn orders_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        self.orders_where("customer_id = $1", customer_id).await
    }

    async fn orders_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Order>> {
        self.orders_where("seller_id = $1", seller_id).await
    }

    async fn order_count(&self) -> StoreResult<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await.map_err(backend)?;
        Ok(n.max(0) as u64)
    }

    async fn save_status(&self, o: &Order, seen: SeenStatus) -> StoreResult<bool> {
        let done = sqlx::query(SAVE_STATUS)
            .bind(o.id).bind(o.status.as_str()).bind(o.payment_status.as_str()).bind(o.updated_at)
            .bind(seen.status.as_str()).bind(seen.payment_status.as_str())
            .execute(&self.pool).await.map_err(backend)?;
        if done.rows_affected() > 0 { return Ok(true); }

        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(o.id).fetch_one(&self.pool).await.map_err(backend)?;
        if exists { Ok(false) } else { Err(StoreError::NotFound("Order")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::sample_address;
    use crate::domain::aggregates::{FulfillmentStatus, PaymentStatus};
    use crate::services::testing::{seed_customer, seed_product, seed_seller};
    use crate::store::{test_db, Repositories};

    struct Fixture { repos: Repositories, customer: Uuid, seller: Uuid }

    /// `None` when no container runtime is reachable.
    async fn fixture() -> Option<Fixture> {
        let repos = Repositories::postgres(test_db::pool().await?);
        let seller = seed_seller(&repos, true).await.id;
        let customer = seed_customer(&repos).await.id;
        Some(Fixture { repos, customer, seller })
    }

    fn line(product: &Product, qty: u32) -> (LineItem, Reservation) {
        let quantity = Quantity::new(qty).unwrap();
        let item = LineItem { product_id: product.id, name: product.name.clone(), unit_price: product.price, quantity };
        (item, Reservation { product_id: product.id, quantity })
    }

    fn order(f: &Fixture, items: Vec<LineItem>) -> Order {
        Order::place(f.customer, f.seller, items, sample_address(), PaymentStatus::Pending, FulfillmentStatus::Pending)
            .unwrap()
    }

    #[tokio::test]
    async fn purchase_is_all_or_nothing() {
        let Some(f) = fixture().await else { return };
        let a = seed_product(&f.repos, f.seller, "A", Decimal::ONE, 5).await;
        let b = seed_product(&f.repos, f.seller, "B", Decimal::ONE, 1).await;
        let (item_a, res_a) = line(&a, 2);
        let (item_b, res_b) = line(&b, 3);

        let err = f.repos.orders.place(&order(&f, vec![item_a, item_b]), &[res_a, res_b]).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { ref name, .. } if name == "B"));
        assert_eq!(f.repos.catalog.product(a.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(f.repos.catalog.product(b.id).await.unwrap().unwrap().stock, 1);
        assert_eq!(f.repos.orders.order_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_purchases_never_oversell() {
        let Some(f) = fixture().await else { return };
        let p = seed_product(&f.repos, f.seller, "Lamp", Decimal::TEN, 5).await;

        let attempts = (0..4).map(|_| {
            let repos = f.repos.clone();
            let (item, reservation) = line(&p, 2);
            let order = order(&f, vec![item]);
            tokio::spawn(async move { repos.orders.place(&order, &[reservation]).await })
        });
        let results: Vec<_> = futures::future::join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(e, StoreError::InsufficientStock { .. })));
        assert_eq!(f.repos.catalog.product(p.id).await.unwrap().unwrap().stock, 1);
        assert_eq!(f.repos.orders.order_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn order_reads_back_as_written() {
        let Some(f) = fixture().await else { return };
        let a = seed_product(&f.repos, f.seller, "Kettle", Decimal::new(1999, 2), 5).await;
        let b = seed_product(&f.repos, f.seller, "Mug", Decimal::new(450, 2), 5).await;
        let (item_a, res_a) = line(&a, 1);
        let (item_b, res_b) = line(&b, 2);
        let placed = order(&f, vec![item_a, item_b]);

        let remaining = f.repos.orders.place(&placed, &[res_a, res_b]).await.unwrap();
        assert_eq!(remaining.iter().find(|r| r.product_id == b.id).unwrap().remaining_stock, 3);

        let stored = f.repos.orders.order(placed.id).await.unwrap().unwrap();
        assert_eq!(stored.shipping_address, sample_address());
        assert_eq!(stored.products, placed.products);
        assert_eq!(stored.total_amount, Decimal::new(2899, 2));
        assert_eq!(f.repos.orders.orders_for_customer(f.customer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn product_patch_leaves_reserved_stock_alone() {
        let Some(f) = fixture().await else { return };
        let p = seed_product(&f.repos, f.seller, "Rug", Decimal::TEN, 5).await;
        let (item, reservation) = line(&p, 3);
        f.repos.orders.place(&order(&f, vec![item]), &[reservation]).await.unwrap();

        let patch = ProductPatch { name: Some("Wool rug".into()), ..Default::default() };
        let saved = f.repos.catalog.update_product(p.id, &patch).await.unwrap();
        assert_eq!(saved.name, "Wool rug");
        assert_eq!(saved.stock, 2);
        assert_eq!(saved.price, Decimal::TEN);

        let missing = f.repos.catalog.update_product(Uuid::new_v4(), &patch).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn stale_status_and_cart_writes_are_refused() {
        let Some(f) = fixture().await else { return };
        let p = seed_product(&f.repos, f.seller, "Rug", Decimal::TEN, 5).await;
        let (item, reservation) = line(&p, 1);
        let placed = order(&f, vec![item]);
        f.repos.orders.place(&placed, &[reservation]).await.unwrap();

        let seen = SeenStatus::of(&placed);
        let mut shipping = placed.clone();
        shipping.status = FulfillmentStatus::Shipped;
        let mut paying = placed.clone();
        paying.payment_status = PaymentStatus::Completed;
        assert!(f.repos.orders.save_status(&shipping, seen).await.unwrap());
        assert!(!f.repos.orders.save_status(&paying, seen).await.unwrap());
        assert_eq!(f.repos.orders.order(placed.id).await.unwrap().unwrap().status, FulfillmentStatus::Shipped);

        let mut cart = Cart::for_customer(f.customer);
        cart.set_quantity(p.id, Some(Quantity::new(2).unwrap()));
        assert!(f.repos.carts.save_cart(&cart).await.unwrap());
        assert!(!f.repos.carts.save_cart(&cart).await.unwrap());
        let stored = f.repos.carts.cart_for(f.customer).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.items().len(), 1);
    }
}
