//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::value_objects::{not_blank, Quantity};

/// A listed product. The owning seller never changes after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub stock: i32,
    pub images: Vec<String>,
    pub brand: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "not_blank")]
    pub description: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[validate(custom = "not_blank")]
    pub category: String,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(custom = "not_blank")]
    pub brand: String,
}

/// Partial update; absent fields are left alone.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Option<Decimal>,
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub brand: Option<String>,
}

fn non_negative(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() { Err(ValidationError::new("negative")) } else { Ok(()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Insufficient stock for product {name}: {available} available, {requested} requested")]
    InsufficientStock { name: String, available: i32, requested: u32 },
}

impl Product {
    pub fn create(seller_id: Uuid, new: NewProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), seller_id, name: new.name, description: new.description, price: new.price,
            category: new.category, stock: new.stock, images: new.images, brand: new.brand,
            created_at: now, updated_at: now,
        }
    }

    pub fn can_supply(&self, quantity: Quantity) -> bool { i64::from(self.stock) >= i64::from(quantity.value()) }

    pub fn line_total(&self, quantity: Quantity) -> Decimal { self.price * Decimal::from(quantity.value()) }

    /// Takes `quantity` units out of stock and returns what is left.
    pub fn reserve(&mut self, quantity: Quantity) -> Result<i32, ProductError> {
        if !self.can_supply(quantity) {
            return Err(ProductError::InsufficientStock {
                name: self.name.clone(), available: self.stock, requested: quantity.value(),
            });
        }
        self.stock -= quantity.as_stock();
        self.touch();
        Ok(self.stock)
    }

    pub fn apply(&mut self, patch: &ProductPatch) {
        if let Some(v) = &patch.name { self.name = v.clone(); }
        if let Some(v) = &patch.description { self.description = v.clone(); }
        if let Some(v) = patch.price { self.price = v; }
        if let Some(v) = &patch.category { self.category = v.clone(); }
        if let Some(v) = patch.stock { self.stock = v; }
        if let Some(v) = &patch.images { self.images = v.clone(); }
        if let Some(v) = &patch.brand { self.brand = v.clone(); }
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
pub(crate) fn sample(seller_id: Uuid, name: &str, price: Decimal, stock: i32) -> Product {
    Product::create(seller_id, NewProduct {
        name: name.into(), description: format!("{name} description"), price, category: "General".into(),
        stock, images: vec![], brand: "Acme".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_decrements_stock() {
        let mut p = sample(Uuid::new_v4(), "Kettle", Decimal::new(1999, 2), 5);
        assert_eq!(p.reserve(Quantity::new(3).unwrap()).unwrap(), 2);
        assert_eq!(p.stock, 2);
    }

    #[test]
    fn reserve_refuses_to_go_negative() {
        let mut p = sample(Uuid::new_v4(), "Kettle", Decimal::new(1999, 2), 2);
        let err = p.reserve(Quantity::new(3).unwrap()).unwrap_err();
        assert!(matches!(err, ProductError::InsufficientStock { available: 2, requested: 3, .. }));
        assert_eq!(p.stock, 2);
    }

    #[test]
    fn line_total_uses_unit_price() {
        let p = sample(Uuid::new_v4(), "Mug", Decimal::new(250, 2), 10);
        assert_eq!(p.line_total(Quantity::new(4).unwrap()), Decimal::new(1000, 2));
    }

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut p = sample(Uuid::new_v4(), "Mug", Decimal::new(250, 2), 10);
        p.apply(&ProductPatch { name: Some("Big mug".into()), ..Default::default() });
        assert_eq!(p.name, "Big mug");
        assert_eq!(p.stock, 10);
        assert_eq!(p.price, Decimal::new(250, 2));
    }

    #[test]
    fn patch_rejects_negative_price() {
        let patch = ProductPatch { price: Some(Decimal::new(-1, 0)), ..Default::default() };
        assert!(patch.validate().is_err());
    }
}
