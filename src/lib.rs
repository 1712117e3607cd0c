//! Marketplace backend
//!
//! Customers browse products, keep a cart and place orders; sellers list
//! products and fulfil orders; administrators approve sellers.
//!
//! ## Features
//! - Inventory-reserving checkout (stock never goes negative, all-or-nothing)
//! - Per-customer carts
//! - Order ledger with fulfillment and payment state machines
//! - Role-scoped bearer credentials
//! - Postgres or in-memory persistence

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod events;
pub mod notify;
pub mod otp;
pub mod services;
pub mod store;
pub mod upload;

pub use auth::AuthError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Insufficient stock for product {product}")]
    InsufficientStock { product: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Account not approved yet")]
    SellerNotApproved,

    #[error("Cannot change {field} from {from} to {to}")]
    InvalidTransition { field: &'static str, from: String, to: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid email or password")]
    InvalidLogin,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody { pub code: &'static str, pub message: String }

impl EcommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidReference(_) | Self::InsufficientStock { .. } | Self::InvalidLogin => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::SellerNotApproved => StatusCode::FORBIDDEN,
            Self::InvalidTransition { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Auth(AuthError::WrongRole) => StatusCode::FORBIDDEN,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code clients branch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidReference(_) => "invalid_reference",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::SellerNotApproved => "seller_not_approved",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::InvalidLogin => "invalid_login",
            Self::Auth(e) => e.code(),
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody { code: self.code(), message })).into_response()
    }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}
