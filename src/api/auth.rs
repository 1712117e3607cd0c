//! Registration and login for every account kind

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::ApiJson;
use crate::auth::AdminPrincipal;
use crate::domain::aggregates::{Admin, Credentials, Customer, NewCustomer, NewSeller, Seller};
use crate::services::{AccountService, LoginResponse};
use crate::Result;

pub async fn register_customer(
    State(accounts): State<Arc<AccountService>>,
    ApiJson(new): ApiJson<NewCustomer>,
) -> Result<(StatusCode, Json<Value>)> {
    let customer = accounts.register_customer(new).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Customer registered successfully", "customer": customer }))))
}

pub async fn login_customer(
    State(accounts): State<Arc<AccountService>>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<Json<LoginResponse<Customer>>> {
    Ok(Json(accounts.login_customer(credentials).await?))
}

pub async fn register_seller(
    State(accounts): State<Arc<AccountService>>,
    ApiJson(new): ApiJson<NewSeller>,
) -> Result<(StatusCode, Json<Value>)> {
    let seller = accounts.register_seller(new).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Seller registered, awaiting approval", "seller": seller }))))
}

pub async fn login_seller(
    State(accounts): State<Arc<AccountService>>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<Json<LoginResponse<Seller>>> {
    Ok(Json(accounts.login_seller(credentials).await?))
}

/// Open while no administrator exists; afterwards requires an administrator credential.
pub async fn register_admin(
    State(accounts): State<Arc<AccountService>>,
    caller: Option<AdminPrincipal>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<(StatusCode, Json<Value>)> {
    let admin: Admin = accounts.register_admin(credentials, caller.map(|c| c.id())).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Admin registered successfully", "admin": admin }))))
}

pub async fn login_admin(
    State(accounts): State<Arc<AccountService>>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<Json<LoginResponse<Admin>>> {
    Ok(Json(accounts.login_admin(credentials).await?))
}
