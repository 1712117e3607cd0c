//! Request extractors that verify the bearer credential

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use super::{AuthError, TokenService};
use crate::domain::aggregates::{Role, Seller};
use crate::store::Repositories;
use crate::EcommerceError;

/// Verified identity of the caller. Trusted as-is once extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal { pub id: Uuid, pub role: Role }

impl Principal {
    pub fn require(self, role: Role) -> Result<Self, AuthError> {
        if self.role == role { return Ok(self); }
        tracing::warn!(principal = %self.id, role = %self.role, required = %role, "wrong account kind");
        Err(AuthError::WrongRole)
    }
}

fn bearer(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts.headers.get(AUTHORIZATION).ok_or(AuthError::MissingCredential)?;
    header.to_str().ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidCredential)
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    Arc<TokenService>: FromRef<S>,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(*principal);
        }
        let tokens = Arc::<TokenService>::from_ref(state);
        let claims = bearer(parts).and_then(|token| tokens.verify(token)).map_err(|e| {
            tracing::warn!(uri = %parts.uri, error = %e, "credential rejected");
            e
        })?;
        let principal = Principal { id: claims.sub, role: claims.role };
        parts.extensions.insert(principal);
        Ok(principal)
    }
}

macro_rules! role_extractor {
    ($(#[$doc:meta])* $name:ident => $role:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name(pub Principal);

        impl $name {
            pub fn id(&self) -> Uuid { self.0.id }
        }

        #[async_trait]
        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
            Arc<TokenService>: FromRef<S>,
        {
            type Rejection = EcommerceError;

            async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
                let principal = Principal::from_request_parts(parts, state).await?;
                Ok(Self(principal.require($role)?))
            }
        }
    };
}

role_extractor!(
    /// Caller holding a customer credential.
    CustomerPrincipal => Role::Customer
);
role_extractor!(
    /// Caller holding a seller credential. Approval is not checked.
    SellerPrincipal => Role::Seller
);
role_extractor!(AdminPrincipal => Role::Admin);

/// Seller whose account an administrator has approved. Required for every catalog mutation.
#[derive(Debug, Clone)]
pub struct ApprovedSeller(pub Seller);

#[async_trait]
impl<S> FromRequestParts<S> for ApprovedSeller
where
    S: Send + Sync,
    Arc<TokenService>: FromRef<S>,
    Repositories: FromRef<S>,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SellerPrincipal(principal) = SellerPrincipal::from_request_parts(parts, state).await?;
        let repos = Repositories::from_ref(state);
        let seller = repos.accounts.seller(principal.id).await?
            .ok_or_else(|| EcommerceError::NotFound("Seller".into()))?;
        if !seller.is_approved() {
            tracing::warn!(
                seller_id = %seller.id, status = seller.account_status.as_str(), "catalog change by unapproved seller"
            );
            return Err(EcommerceError::SellerNotApproved);
        }
        Ok(Self(seller))
    }
}
