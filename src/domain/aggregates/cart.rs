//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Quantity;

/// One customer's cart. Holds at most one entry per product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of saves so far; a save only lands on the version it was read at.
    #[serde(default)]
    pub version: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem { pub id: Uuid, pub product_id: Uuid, pub quantity: Quantity, pub added_at: DateTime<Utc> }

impl Cart {
    pub fn for_customer(customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), customer_id, items: vec![], created_at: now, updated_at: now, version: 0 }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Sets the quantity for `product_id`, replacing any previous value. `None` removes the entry.
    /// Returns whether the cart changed.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: Option<Quantity>) -> bool {
        let position = self.items.iter().position(|i| i.product_id == product_id);
        match (position, quantity) {
            (Some(idx), Some(q)) => self.items[idx].quantity = q,
            (Some(idx), None) => { self.items.remove(idx); }
            (None, Some(q)) => {
                self.items.push(CartItem { id: Uuid::now_v7(), product_id, quantity: q, added_at: Utc::now() });
            }
            (None, None) => return false,
        }
        self.touch();
        true
    }

    /// Removes the entry with this cart-item id, if it belongs to this cart.
    pub fn remove_item(&mut self, item_id: Uuid) -> Option<CartItem> {
        let idx = self.items.iter().position(|i| i.id == item_id)?;
        let removed = self.items.remove(idx);
        self.touch();
        Some(removed)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
