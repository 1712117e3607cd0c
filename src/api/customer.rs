//! Customer-facing routes: profile, storefront, cart, purchase and order history

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::ApiJson;
use crate::auth::CustomerPrincipal;
use crate::domain::aggregates::{Customer, Order, Product, ProfileUpdate};
use crate::services::{
    AccountService, CartChange, CartService, CartView, CatalogService, CheckoutService, OrderService, PurchaseReceipt,
    PurchaseRequest,
};
use crate::Result;

pub async fn profile(
    State(accounts): State<Arc<AccountService>>,
    customer: CustomerPrincipal,
) -> Result<Json<Customer>> {
    Ok(Json(accounts.profile(customer.id()).await?))
}

pub async fn update_profile(
    State(accounts): State<Arc<AccountService>>,
    customer: CustomerPrincipal,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>> {
    let customer = accounts.update_profile(customer.id(), update).await?;
    Ok(Json(json!({ "message": "Profile updated successfully", "customer": customer })))
}

pub async fn all_products(State(catalog): State<Arc<CatalogService>>) -> Result<Json<Vec<Product>>> {
    Ok(Json(catalog.all().await?))
}

pub async fn product(State(catalog): State<Arc<CatalogService>>, Path(id): Path<String>) -> Result<Json<Product>> {
    Ok(Json(catalog.get(&id).await?))
}

pub async fn cart(State(carts): State<Arc<CartService>>, customer: CustomerPrincipal) -> Result<Json<CartView>> {
    Ok(Json(carts.view(customer.id()).await?))
}

pub async fn add_to_cart(
    State(carts): State<Arc<CartService>>,
    customer: CustomerPrincipal,
    ApiJson(change): ApiJson<CartChange>,
) -> Result<Json<CartView>> {
    Ok(Json(carts.set_quantity(customer.id(), change).await?))
}

pub async fn remove_from_cart(
    State(carts): State<Arc<CartService>>,
    customer: CustomerPrincipal,
    Path(item_id): Path<String>,
) -> Result<Json<CartView>> {
    Ok(Json(carts.remove_item(customer.id(), &item_id).await?))
}

pub async fn purchase(
    State(checkout): State<Arc<CheckoutService>>,
    customer: CustomerPrincipal,
    ApiJson(request): ApiJson<PurchaseRequest>,
) -> Result<Json<PurchaseReceipt>> {
    Ok(Json(checkout.place_order(customer.id(), request).await?))
}

pub async fn orders(State(orders): State<Arc<OrderService>>, customer: CustomerPrincipal) -> Result<Json<Vec<Order>>> {
    Ok(Json(orders.for_customer(customer.id()).await?))
}

pub async fn order(
    State(orders): State<Arc<OrderService>>,
    CustomerPrincipal(principal): CustomerPrincipal,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(orders.get(principal, &order_id).await?))
}
