//! Per-customer carts

use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, Product};
use crate::domain::value_objects::{parse_id, Quantity};
use crate::store::Repositories;
use crate::{EcommerceError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartChange {
    pub product_id: Option<String>,
    pub quantity: Option<Value>,
}

/// A cart item with its product resolved at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub product: Product,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_items: Vec<CartLine>,
    pub total: Decimal,
}

/// Attempts at a cart change before giving up on concurrent writers.
const SAVE_ATTEMPTS: usize = 3;

/// Absent or null means one unit. Other values must be whole numbers; zero and below mean removal.
fn requested_quantity(raw: Option<&Value>) -> Result<Option<Quantity>> {
    let invalid = || EcommerceError::Validation("Quantity must be an integer".into());
    let wanted: i64 = match raw {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    if wanted <= 0 { return Ok(None); }
    u32::try_from(wanted).ok()
        .and_then(|q| Quantity::new(q).ok())
        .map(Some)
        .ok_or_else(|| EcommerceError::Validation(format!("Quantity must be at most {}", Quantity::MAX)))
}

pub struct CartService { repos: Repositories }

impl CartService {
    pub fn new(repos: Repositories) -> Self { Self { repos } }

    /// Sets the quantity of one product in the caller's cart, creating the cart on first use.
    pub async fn set_quantity(&self, customer_id: Uuid, change: CartChange) -> Result<CartView> {
        let product_id = parse_id(change.product_id.as_deref().unwrap_or_default())?;
        let quantity = requested_quantity(change.quantity.as_ref())?;
        if quantity.is_some() && self.repos.catalog.product(product_id).await?.is_none() {
            return Err(EcommerceError::NotFound(format!("Product {product_id}")));
        }

        let cart = self.change_cart(customer_id, |cart| Ok(cart.set_quantity(product_id, quantity))).await?;
        let items = cart.items().len();
        tracing::debug!(%customer_id, %product_id, quantity = ?quantity.map(|q| q.value()), items, "cart updated");
        self.resolve(cart.items()).await
    }

    pub async fn view(&self, customer_id: Uuid) -> Result<CartView> {
        match self.repos.carts.cart_for(customer_id).await? {
            Some(cart) => self.resolve(cart.items()).await,
            None => Ok(CartView::default()),
        }
    }

    /// Removes one entry by cart-item id. Items in someone else's cart read as not found.
    pub async fn remove_item(&self, customer_id: Uuid, raw_item_id: &str) -> Result<CartView> {
        let item_id = parse_id(raw_item_id)?;
        let cart = self.change_cart(customer_id, |cart| match cart.remove_item(item_id) {
            Some(_) => Ok(true),
            None => {
                tracing::warn!(%customer_id, %item_id, "cart item not in caller's cart");
                Err(EcommerceError::NotFound("Cart item".into()))
            }
        }).await?;
        self.resolve(cart.items()).await
    }

    /// Reads the cart, applies `change` and saves it. A save that lost to another writer is redone
    /// on a fresh read. `change` returns whether it modified anything.
    async fn change_cart(&self, customer_id: Uuid, change: impl Fn(&mut Cart) -> Result<bool>) -> Result<Cart> {
        for attempt in 1..=SAVE_ATTEMPTS {
            let mut cart = self.repos.carts.cart_for(customer_id).await?
                .unwrap_or_else(|| Cart::for_customer(customer_id));
            if !change(&mut cart)? || self.repos.carts.save_cart(&cart).await? {
                return Ok(cart);
            }
            tracing::debug!(%customer_id, attempt, "cart saved concurrently, retrying");
        }
        Err(EcommerceError::Conflict("Cart was changed by another request, try again".into()))
    }

    async fn resolve(&self, items: &[CartItem]) -> Result<CartView> {
        let products = try_join_all(items.iter().map(|i| self.repos.catalog.product(i.product_id))).await?;
        let cart_items: Vec<CartLine> = items.iter().zip(products)
            .filter_map(|(item, product)| {
                let product = product?;
                let line_total = product.line_total(item.quantity);
                Some(CartLine { id: item.id, product, quantity: item.quantity.value(), line_total })
            })
            .collect();
        let total = cart_items.iter().map(|l| l.line_total).sum();
        Ok(CartView { cart_items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{seed_product, seed_seller};
    use rstest::rstest;
    use serde_json::json;

    fn change(product: Uuid, quantity: Value) -> CartChange {
        CartChange { product_id: Some(product.to_string()), quantity: Some(quantity) }
    }

    #[tokio::test]
    async fn missing_cart_reads_as_empty() {
        let repos = Repositories::in_memory();
        let view = CartService::new(repos).view(Uuid::new_v4()).await.unwrap();
        assert!(view.cart_items.is_empty());
        assert_eq!(view.total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn set_replaces_and_zero_removes() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let p = seed_product(&repos, seller.id, "Lamp", Decimal::new(500, 2), 10).await;
        let svc = CartService::new(repos);
        let customer = Uuid::new_v4();

        svc.set_quantity(customer, change(p.id, json!(2))).await.unwrap();
        let view = svc.set_quantity(customer, change(p.id, json!(5))).await.unwrap();
        assert_eq!(view.cart_items.len(), 1);
        assert_eq!(view.cart_items[0].quantity, 5);
        assert_eq!(view.total, Decimal::new(2500, 2));

        let view = svc.set_quantity(customer, change(p.id, json!(0))).await.unwrap();
        assert!(view.cart_items.is_empty());
        assert!(svc.view(customer).await.unwrap().cart_items.is_empty());
    }

    #[tokio::test]
    async fn carts_are_per_customer() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let p = seed_product(&repos, seller.id, "Lamp", Decimal::ONE, 10).await;
        let svc = CartService::new(repos);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let view = svc.set_quantity(alice, change(p.id, json!(1))).await.unwrap();
        let item_id = view.cart_items[0].id.to_string();

        assert!(svc.view(bob).await.unwrap().cart_items.is_empty());
        assert!(matches!(svc.remove_item(bob, &item_id).await, Err(EcommerceError::NotFound(_))));
        svc.set_quantity(bob, change(p.id, json!(3))).await.unwrap();
        assert!(matches!(svc.remove_item(bob, &item_id).await, Err(EcommerceError::NotFound(_))));
        assert_eq!(svc.view(alice).await.unwrap().cart_items.len(), 1);

        assert!(svc.remove_item(alice, &item_id).await.unwrap().cart_items.is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_rejected() {
        let svc = CartService::new(Repositories::in_memory());
        let err = svc.set_quantity(Uuid::new_v4(), change(Uuid::new_v4(), json!(1))).await.unwrap_err();
        assert!(matches!(err, EcommerceError::NotFound(_)));
        let err = svc.set_quantity(Uuid::new_v4(), CartChange { product_id: Some("abc".into()), quantity: None }).await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn oversized_quantity_is_rejected_and_entry_kept() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let p = seed_product(&repos, seller.id, "Lamp", Decimal::ONE, 10).await;
        let svc = CartService::new(repos);
        let customer = Uuid::new_v4();

        svc.set_quantity(customer, change(p.id, json!(2))).await.unwrap();
        let err = svc.set_quantity(customer, change(p.id, json!(5_000_000_000_i64))).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Validation(_)));
        let view = svc.view(customer).await.unwrap();
        assert_eq!(view.cart_items.len(), 1);
        assert_eq!(view.cart_items[0].quantity, 2);
    }

    #[tokio::test]
    async fn concurrent_changes_are_all_kept() {
        let repos = Repositories::in_memory();
        let seller = seed_seller(&repos, true).await;
        let a = seed_product(&repos, seller.id, "Lamp", Decimal::ONE, 10).await;
        let b = seed_product(&repos, seller.id, "Rug", Decimal::ONE, 10).await;
        let svc = CartService::new(repos);
        let customer = Uuid::new_v4();

        let (first, second) = tokio::join!(
            svc.set_quantity(customer, change(a.id, json!(1))),
            svc.set_quantity(customer, change(b.id, json!(2))),
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(svc.view(customer).await.unwrap().cart_items.len(), 2);
    }

    #[rstest]
    #[case(None, Some(Some(1)))]
    #[case(Some(json!(null)), Some(Some(1)))]
    #[case(Some(json!(4)), Some(Some(4)))]
    #[case(Some(json!("7")), Some(Some(7)))]
    #[case(Some(json!(0)), Some(None))]
    #[case(Some(json!(-2)), Some(None))]
    #[case(Some(json!(5_000_000_000_i64)), None)]
    #[case(Some(json!(1.5)), None)]
    #[case(Some(json!("many")), None)]
    fn quantity_parsing(#[case] raw: Option<Value>, #[case] expected: Option<Option<u32>>) {
        let parsed = requested_quantity(raw.as_ref()).ok().map(|q| q.map(|q| q.value()));
        assert_eq!(parsed, expected);
    }
}
