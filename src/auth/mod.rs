//! Access control: role-scoped bearer credentials and the extractors that enforce them
//!
//! - [`TokenService`] issues and verifies credentials
//! - [`Principal`] is the verified identity attached to a request
//! - [`CustomerPrincipal`], [`SellerPrincipal`], [`AdminPrincipal`] require an account kind
//! - [`ApprovedSeller`] additionally requires an approved seller account

pub mod extractor;
pub mod password;
pub mod token;

pub use extractor::{AdminPrincipal, ApprovedSeller, CustomerPrincipal, Principal, SellerPrincipal};
pub use token::{AuthError, Claims, IssuedToken, TokenConfig, TokenService};
