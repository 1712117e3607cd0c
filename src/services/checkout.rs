//! Inventory reservation flow
//!
//! A purchase is validated line by line before anything is written: identifier shape, product
//! existence, quantity, then stock against everything the request has asked for so far. Only a fully
//! valid request reaches the store, which takes the stock and records the order as one unit of work.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{FulfillmentStatus, LineItem, Order, OrderError, PaymentStatus, Product};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{parse_id, Quantity, ShippingAddress};
use crate::events::EventPublisher;
use crate::notify::{spawn_email, Notifier};
use crate::store::{RemainingStock, Repositories, Reservation};
use crate::{EcommerceError, Result};

/// Body of a purchase. Either `products` (several lines) or `productId`/`quantity` (one line).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub seller_id: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<FulfillmentStatus>,
    pub products: Option<Vec<LineRequest>>,
    pub product_id: Option<String>,
    pub quantity: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl PurchaseRequest {
    fn lines(&self) -> Result<Vec<LineRequest>> {
        match &self.products {
            Some(lines) if lines.is_empty() => {
                Err(EcommerceError::Validation("No products provided for purchase.".into()))
            }
            Some(lines) => Ok(lines.clone()),
            None => Ok(vec![LineRequest { product_id: self.product_id.clone(), quantity: self.quantity.clone() }]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt { pub order: Order, pub updated_products: Vec<RemainingStock> }

/// Lines that passed validation, with the demand they put on each product.
#[derive(Debug, Default)]
pub struct PurchasePlan {
    items: Vec<LineItem>,
    demand: BTreeMap<Uuid, Quantity>,
}

impl PurchasePlan {
    /// Accepts one line if the product can cover it on top of earlier lines for the same product.
    pub fn add(&mut self, seller_id: Uuid, product: &Product, quantity: Quantity) -> Result<()> {
        if product.seller_id != seller_id {
            return Err(EcommerceError::Validation(format!("Product {} is not sold by seller {seller_id}", product.id)));
        }
        let wanted = match self.demand.get(&product.id) {
            Some(earlier) => earlier.checked_add(quantity).ok_or_else(|| insufficient(product))?,
            None => quantity,
        };
        if !product.can_supply(wanted) {
            return Err(insufficient(product));
        }
        self.demand.insert(product.id, wanted);
        self.items.push(LineItem {
            product_id: product.id, name: product.name.clone(), unit_price: product.price, quantity,
        });
        Ok(())
    }

    pub fn total(&self) -> Decimal { self.items.iter().map(LineItem::total).sum() }

    /// One reservation per product, in product-id order.
    pub fn reservations(&self) -> Vec<Reservation> {
        self.demand.iter().map(|(id, q)| Reservation { product_id: *id, quantity: *q }).collect()
    }

    pub fn into_items(self) -> Vec<LineItem> { self.items }
}

fn insufficient(product: &Product) -> EcommerceError {
    tracing::info!(product_id = %product.id, stock = product.stock, "purchase rejected: insufficient stock");
    EcommerceError::InsufficientStock { product: product.name.clone() }
}

impl From<OrderError> for EcommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => EcommerceError::Validation(e.to_string()),
            OrderError::InvalidTransition { field, from, to } => EcommerceError::InvalidTransition { field, from, to },
        }
    }
}

pub struct CheckoutService {
    repos: Repositories,
    events: EventPublisher,
    notifier: Arc<dyn Notifier>,
}

impl CheckoutService {
    pub fn new(repos: Repositories, events: EventPublisher, notifier: Arc<dyn Notifier>) -> Self {
        Self { repos, events, notifier }
    }

    pub async fn place_order(&self, customer_id: Uuid, request: PurchaseRequest) -> Result<PurchaseReceipt> {
        let raw_seller = request.seller_id.as_deref().filter(|s| !s.trim().is_empty());
        let (Some(raw_seller), Some(address)) = (raw_seller, request.shipping_address.as_ref()) else {
            return Err(EcommerceError::Validation("Missing sellerId or shippingAddress".into()));
        };
        address.validate()?;
        let seller_id = parse_id(raw_seller)?;

        let mut plan = PurchasePlan::default();
        for line in request.lines()? {
            let product_id = parse_id(line.product_id.as_deref().unwrap_or_default())?;
            let product = self.repos.catalog.product(product_id).await?
                .ok_or_else(|| EcommerceError::NotFound(format!("Product {product_id}")))?;
            let quantity = Quantity::from_request(line.quantity.as_ref())
                .map_err(|e| EcommerceError::Validation(e.to_string()))?;
            plan.add(seller_id, &product, quantity)?;
        }

        let reservations = plan.reservations();
        let order = Order::place(
            customer_id,
            seller_id,
            plan.into_items(),
            address.clone(),
            request.payment_status.unwrap_or_default(),
            request.status.unwrap_or_default(),
        )?;
        let updated_products = self.repos.orders.place(&order, &reservations).await?;

        tracing::info!(
            order_id = %order.id, %customer_id, %seller_id, total = %order.total_amount, lines = order.products.len(),
            "order placed"
        );
        self.announce(&order, &reservations, &updated_products).await;
        Ok(PurchaseReceipt { order, updated_products })
    }

    async fn announce(&self, order: &Order, reservations: &[Reservation], remaining: &[RemainingStock]) {
        let stock_events = remaining.iter().filter_map(|left| {
            let taken = reservations.iter().find(|r| r.product_id == left.product_id)?;
            Some(DomainEvent::StockReserved {
                product_id: left.product_id, quantity: taken.quantity.value(), remaining: left.remaining_stock,
            })
        });
        self.events.publish(DomainEvent::OrderPlaced {
            order_id: order.id, customer_id: order.customer_id, seller_id: order.seller_id, total: order.total_amount,
        }).await;
        self.events.publish_all(stock_events.collect::<Vec<_>>()).await;

        match self.repos.accounts.customer(order.customer_id).await {
            Ok(Some(customer)) => spawn_email(
                self.notifier.clone(),
                customer.email,
                format!("Order {} confirmed", order.id),
                confirmation_html(order),
            ),
            Ok(None) => tracing::debug!(customer_id = %order.customer_id, "no customer record for confirmation email"),
            Err(e) => tracing::warn!(error = %e, "customer lookup for confirmation email failed"),
        }
    }
}

fn confirmation_html(order: &Order) -> String {
    let rows: String = order.products.iter()
        .map(|i| format!("<tr><td>{}</td><td>{}</td><td>{}</td></tr>", i.name, i.quantity, i.total()))
        .collect();
    format!(
        "<h2>Thank you, {}!</h2><p>Order <b>{}</b> has been placed.</p><table>{rows}</table><p>Total: {}</p>",
        order.shipping_address.full_name, order.id, order.total_amount
    )
}
