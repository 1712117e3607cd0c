//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{Quantity, ShippingAddress};

/// A ledger entry. Line items are value snapshots taken at purchase time; only the two status fields
/// change afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub seller_id: Uuid,
    pub products: Vec<LineItem>,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_status: PaymentStatus,
    pub status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub unit_price: Decimal, pub quantity: Quantity }

impl LineItem {
    pub fn total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity.value()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    #[serde(rename = "Prepared for Shipping")]
    PreparedForShipping,
    Shipped,
    Delivered,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PreparedForShipping => "Prepared for Shipping",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }

    /// Fulfillment only moves forward. Skipping ahead is fine; staying put is a no-op.
    pub fn can_become(&self, next: Self) -> bool { next >= *self }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "Pending", Self::Completed => "Completed", Self::Failed => "Failed" }
    }

    /// Completed is terminal; a failed payment may still complete on retry.
    pub fn can_become(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, _) | (Self::Failed, Self::Failed | Self::Completed) | (Self::Completed, Self::Completed)
        )
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for FulfillmentStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Prepared for Shipping" => Ok(Self::PreparedForShipping),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Requested status change. Each field is applied independently of the other.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: Option<FulfillmentStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdate {
    pub fn is_empty(&self) -> bool { self.status.is_none() && self.payment_status.is_none() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no line items")]
    NoItems,
    #[error("Cannot change {field} from {from} to {to}")]
    InvalidTransition { field: &'static str, from: String, to: String },
}

impl Order {
    /// Builds a new order; the total is always derived from the line items.
    pub fn place(
        customer_id: Uuid,
        seller_id: Uuid,
        products: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_status: PaymentStatus,
        status: FulfillmentStatus,
    ) -> Result<Self, OrderError> {
        if products.is_empty() { return Err(OrderError::NoItems); }
        let total_amount = products.iter().map(LineItem::total).sum();
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), customer_id, seller_id, products, total_amount, shipping_address,
            payment_status, status, created_at: now, updated_at: now,
        })
    }

    /// Applies whichever statuses are present. Nothing changes unless every requested transition is legal.
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<(), OrderError> {
        if let Some(next) = update.status {
            if !self.status.can_become(next) {
                return Err(OrderError::InvalidTransition {
                    field: "status", from: self.status.to_string(), to: next.to_string(),
                });
            }
        }
        if let Some(next) = update.payment_status {
            if !self.payment_status.can_become(next) {
                return Err(OrderError::InvalidTransition {
                    field: "paymentStatus", from: self.payment_status.to_string(), to: next.to_string(),
                });
            }
        }
        if let Some(next) = update.status { self.status = next; }
        if let Some(next) = update.payment_status { self.payment_status = next; }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn involves(&self, principal_id: Uuid) -> bool {
        self.customer_id == principal_id || self.seller_id == principal_id
    }
}

#[cfg(test)]
pub(crate) fn sample_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Rao".into(), phone: "+911234567890".into(), address_line1: "12 MG Road".into(),
        address_line2: Some("Flat 4".into()), city: "Pune".into(), state: "MH".into(),
        postal_code: "411001".into(), country: "India".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn order() -> Order {
        let item = LineItem { product_id: Uuid::new_v4(), name: "Widget".into(), unit_price: Decimal::new(1050, 2), quantity: Quantity::new(2).unwrap() };
        let other = LineItem { product_id: Uuid::new_v4(), name: "Gadget".into(), unit_price: Decimal::new(300, 2), quantity: Quantity::new(1).unwrap() };
        Order::place(Uuid::new_v4(), Uuid::new_v4(), vec![item, other], sample_address(), PaymentStatus::Pending, FulfillmentStatus::Pending).unwrap()
    }

    #[test]
    fn total_is_sum_of_lines() {
        assert_eq!(order().total_amount, Decimal::new(2400, 2));
    }

    #[test]
    fn empty_order_is_rejected() {
        let err = Order::place(Uuid::new_v4(), Uuid::new_v4(), vec![], sample_address(), PaymentStatus::Pending, FulfillmentStatus::Pending);
        assert_eq!(err.unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn fulfillment_moves_forward() {
        let mut o = order();
        o.apply(&StatusUpdate { status: Some(FulfillmentStatus::PreparedForShipping), payment_status: None }).unwrap();
        o.apply(&StatusUpdate { status: Some(FulfillmentStatus::Delivered), payment_status: None }).unwrap();
        let err = o.apply(&StatusUpdate { status: Some(FulfillmentStatus::Pending), payment_status: None }).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { field: "status", .. }));
        assert_eq!(o.status, FulfillmentStatus::Delivered);
    }

    #[test]
    fn rejected_update_changes_nothing() {
        let mut o = order();
        o.apply(&StatusUpdate { status: None, payment_status: Some(PaymentStatus::Completed) }).unwrap();
        let err = o.apply(&StatusUpdate { status: Some(FulfillmentStatus::Shipped), payment_status: Some(PaymentStatus::Failed) });
        assert!(err.is_err());
        assert_eq!(o.status, FulfillmentStatus::Pending);
        assert_eq!(o.payment_status, PaymentStatus::Completed);
    }

    #[rstest]
    #[case(PaymentStatus::Pending, PaymentStatus::Completed, true)]
    #[case(PaymentStatus::Pending, PaymentStatus::Failed, true)]
    #[case(PaymentStatus::Failed, PaymentStatus::Completed, true)]
    #[case(PaymentStatus::Completed, PaymentStatus::Failed, false)]
    #[case(PaymentStatus::Completed, PaymentStatus::Pending, false)]
    #[case(PaymentStatus::Failed, PaymentStatus::Pending, false)]
    fn payment_transitions(#[case] from: PaymentStatus, #[case] to: PaymentStatus, #[case] allowed: bool) {
        assert_eq!(from.can_become(to), allowed);
    }

    #[test]
    fn status_names_round_trip_through_wire_form() {
        let json = serde_json::to_string(&FulfillmentStatus::PreparedForShipping).unwrap();
        assert_eq!(json, "\"Prepared for Shipping\"");
        assert_eq!("Prepared for Shipping".parse::<FulfillmentStatus>().unwrap(), FulfillmentStatus::PreparedForShipping);
    }
}
