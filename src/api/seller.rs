//! Seller routes. Catalog changes go through [`ApprovedSeller`]; order handling only needs a seller credential.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::ApiJson;
use crate::auth::{ApprovedSeller, SellerPrincipal};
use crate::domain::aggregates::{NewProduct, Order, Product, ProductPatch, StatusUpdate};
use crate::services::{CatalogService, OrderService, SellerDashboard};
use crate::Result;

pub async fn add_product(
    State(catalog): State<Arc<CatalogService>>,
    ApprovedSeller(seller): ApprovedSeller,
    ApiJson(new): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Value>)> {
    let product = catalog.add(&seller, new).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Product added successfully", "product": product }))))
}

pub async fn products(
    State(catalog): State<Arc<CatalogService>>,
    seller: SellerPrincipal,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(catalog.list_own(seller.id()).await?))
}

pub async fn update_product(
    State(catalog): State<Arc<CatalogService>>,
    ApprovedSeller(seller): ApprovedSeller,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<Value>> {
    let product = catalog.update(&seller, &id, patch).await?;
    Ok(Json(json!({ "message": "Product updated successfully", "product": product })))
}

pub async fn delete_product(
    State(catalog): State<Arc<CatalogService>>,
    ApprovedSeller(seller): ApprovedSeller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    catalog.delete(&seller, &id).await?;
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

pub async fn orders(State(orders): State<Arc<OrderService>>, seller: SellerPrincipal) -> Result<Json<Vec<Order>>> {
    Ok(Json(orders.for_seller(seller.id()).await?))
}

pub async fn order(
    State(orders): State<Arc<OrderService>>,
    SellerPrincipal(principal): SellerPrincipal,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(orders.get(principal, &order_id).await?))
}

pub async fn update_order_status(
    State(orders): State<Arc<OrderService>>,
    seller: SellerPrincipal,
    Path(order_id): Path<String>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<Value>> {
    let order = orders.update_status(seller.id(), &order_id, update).await?;
    Ok(Json(json!({ "message": "Order updated successfully", "order": order })))
}

pub async fn dashboard(
    State(orders): State<Arc<OrderService>>,
    seller: SellerPrincipal,
) -> Result<Json<SellerDashboard>> {
    Ok(Json(orders.seller_dashboard(seller.id()).await?))
}
