//! Order ledger: lookups, status changes and the seller dashboard

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{FulfillmentStatus, Order, StatusUpdate};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::parse_id;
use crate::events::EventPublisher;
use crate::store::{Repositories, SeenStatus};
use crate::{EcommerceError, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerDashboard {
    pub total_orders: usize,
    /// Sum of delivered orders only.
    pub total_sales: Decimal,
    pub pending_orders: usize,
    pub orders: Vec<Order>,
}

impl SellerDashboard {
    fn from_orders(orders: Vec<Order>) -> Self {
        let total_sales = orders.iter()
            .filter(|o| o.status == FulfillmentStatus::Delivered)
            .map(|o| o.total_amount)
            .sum();
        let pending_orders = orders.iter().filter(|o| o.status == FulfillmentStatus::Pending).count();
        Self { total_orders: orders.len(), total_sales, pending_orders, orders }
    }
}

/// Attempts at a status change before giving up on concurrent writers.
const STATUS_ATTEMPTS: usize = 3;

pub struct OrderService {
    repos: Repositories,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(repos: Repositories, events: EventPublisher) -> Self { Self { repos, events } }

    /// Only the seller the order was placed with may change it.
    ///
    /// The transition is checked against the stored order and written only if that order is still
    /// what was checked; otherwise it is re-read and checked again.
    pub async fn update_status(&self, seller_id: Uuid, raw_order_id: &str, update: StatusUpdate) -> Result<Order> {
        let order_id = parse_id(raw_order_id)?;
        if update.is_empty() {
            return Err(EcommerceError::Validation("Nothing to update: provide status or paymentStatus".into()));
        }
        for attempt in 1..=STATUS_ATTEMPTS {
            let mut order = self.repos.orders.order(order_id).await?
                .ok_or_else(|| EcommerceError::NotFound("Order".into()))?;
            if order.seller_id != seller_id {
                tracing::warn!(%order_id, %seller_id, owner = %order.seller_id, "status change by foreign seller");
                return Err(EcommerceError::Unauthorized("Unauthorized seller".into()));
            }

            let seen = SeenStatus::of(&order);
            order.apply(&update)?;
            if !self.repos.orders.save_status(&order, seen).await? {
                tracing::debug!(%order_id, attempt, "order status changed concurrently, retrying");
                continue;
            }
            tracing::info!(
                %order_id, status = %order.status, payment_status = %order.payment_status, "order status changed"
            );
            self.events.publish(DomainEvent::OrderStatusChanged {
                order_id, status: order.status, payment_status: order.payment_status,
            }).await;
            return Ok(order);
        }
        Err(EcommerceError::Conflict("Order was changed by another request, try again".into()))
    }

    /// Visible to the customer who placed it and the seller who fulfils it; anyone else gets not found.
    pub async fn get(&self, principal: Principal, raw_order_id: &str) -> Result<Order> {
        let order_id = parse_id(raw_order_id)?;
        self.repos.orders.order(order_id).await?
            .filter(|o| o.involves(principal.id))
            .ok_or_else(|| EcommerceError::NotFound("Order".into()))
    }

    pub async fn for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.repos.orders.orders_for_customer(customer_id).await?)
    }

    pub async fn for_seller(&self, seller_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.repos.orders.orders_for_seller(seller_id).await?)
    }

    pub async fn seller_dashboard(&self, seller_id: Uuid) -> Result<SellerDashboard> {
        Ok(SellerDashboard::from_orders(self.for_seller(seller_id).await?))
    }
}
