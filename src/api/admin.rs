//! Administrator routes

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AdminPrincipal;
use crate::domain::aggregates::{Seller, SellerStatus};
use crate::domain::value_objects::parse_id;
use crate::services::{AccountService, AdminDashboard};
use crate::Result;

pub async fn sellers(State(accounts): State<Arc<AccountService>>, _admin: AdminPrincipal) -> Result<Json<Vec<Seller>>> {
    Ok(Json(accounts.sellers().await?))
}

pub async fn approve_seller(
    State(accounts): State<Arc<AccountService>>,
    admin: AdminPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let seller = accounts.set_seller_status(parse_id(&id)?, SellerStatus::Approved).await?;
    tracing::info!(admin_id = %admin.id(), seller_id = %seller.id, "seller approved");
    Ok(Json(json!({ "message": "Seller approved successfully", "seller": seller })))
}

pub async fn disable_seller(
    State(accounts): State<Arc<AccountService>>,
    admin: AdminPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let seller = accounts.set_seller_status(parse_id(&id)?, SellerStatus::Disabled).await?;
    tracing::info!(admin_id = %admin.id(), seller_id = %seller.id, "seller disabled");
    Ok(Json(json!({ "message": "Seller disabled", "seller": seller })))
}

pub async fn dashboard(
    State(accounts): State<Arc<AccountService>>,
    _admin: AdminPrincipal,
) -> Result<Json<AdminDashboard>> {
    Ok(Json(accounts.dashboard().await?))
}
