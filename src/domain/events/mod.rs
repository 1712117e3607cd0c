//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{FulfillmentStatus, PaymentStatus, SellerStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced { order_id: Uuid, customer_id: Uuid, seller_id: Uuid, total: Decimal },
    OrderStatusChanged { order_id: Uuid, status: FulfillmentStatus, payment_status: PaymentStatus },
    StockReserved { product_id: Uuid, quantity: u32, remaining: i32 },
    SellerStatusChanged { seller_id: Uuid, status: SellerStatus },
}

impl DomainEvent {
    /// NATS subject suffix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::StockReserved { .. } => "stock_reserved",
            Self::SellerStatusChanged { .. } => "seller_status_changed",
        }
    }
}
