//! Registration, login and profile management for every account kind, plus seller approval

use futures::try_join;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{IssuedToken, TokenService};
use crate::domain::aggregates::account::normalize_email;
use crate::domain::aggregates::{
    Admin, Credentials, Customer, NewCustomer, NewSeller, Product, ProfileUpdate, Role, Seller, SellerStatus,
};
use crate::domain::events::DomainEvent;
use crate::events::EventPublisher;
use crate::store::Repositories;
use crate::{EcommerceError, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse<T> {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub account: T,
}

impl<T> LoginResponse<T> {
    fn new(issued: IssuedToken, account: T) -> Self {
        Self { token: issued.token, expires_at: issued.expires_at, account }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_sellers: usize,
    pub total_products: usize,
    pub total_orders: u64,
    pub sellers: Vec<Seller>,
    pub products: Vec<Product>,
}

pub struct AccountService {
    repos: Repositories,
    tokens: Arc<TokenService>,
    events: EventPublisher,
}

impl AccountService {
    pub fn new(repos: Repositories, tokens: Arc<TokenService>, events: EventPublisher) -> Self {
        Self { repos, tokens, events }
    }

    // ---- customers ----

    pub async fn register_customer(&self, new: NewCustomer) -> Result<Customer> {
        new.validate()?;
        if self.repos.accounts.customer_by_email(&normalize_email(&new.email)).await?.is_some() {
            return Err(EcommerceError::Conflict("Email already registered".into()));
        }
        let hash = hash_password(new.password.clone()).await?;
        let customer = self.repos.accounts.insert_customer(Customer::register(new, hash)).await?;
        tracing::info!(customer_id = %customer.id, "customer registered");
        Ok(customer)
    }

    pub async fn login_customer(&self, credentials: Credentials) -> Result<LoginResponse<Customer>> {
        credentials.validate().map_err(|_| EcommerceError::InvalidLogin)?;
        let customer = self.repos.accounts.customer_by_email(&normalize_email(&credentials.email)).await?;
        let customer = check_password(customer, credentials.password, |c| c.password_hash.clone()).await?;
        let issued = self.tokens.issue(customer.id, Role::Customer)?;
        Ok(LoginResponse::new(issued, customer))
    }

    pub async fn profile(&self, customer_id: Uuid) -> Result<Customer> {
        self.repos.accounts.customer(customer_id).await?.ok_or_else(|| EcommerceError::NotFound("Customer".into()))
    }

    pub async fn update_profile(&self, customer_id: Uuid, update: ProfileUpdate) -> Result<Customer> {
        update.validate()?;
        let mut customer = self.profile(customer_id).await?;
        let hash = match update.password.clone().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };
        customer.apply(update, hash);
        self.repos.accounts.save_customer(&customer).await?;
        Ok(customer)
    }

    // ---- sellers ----

    pub async fn register_seller(&self, new: NewSeller) -> Result<Seller> {
        new.validate()?;
        if self.repos.accounts.seller_by_email(&normalize_email(&new.email)).await?.is_some() {
            return Err(EcommerceError::Conflict("Email already registered".into()));
        }
        let hash = hash_password(new.password.clone()).await?;
        let seller = self.repos.accounts.insert_seller(Seller::register(new, hash)).await?;
        tracing::info!(seller_id = %seller.id, shop = %seller.shop_name, "seller registered, awaiting approval");
        Ok(seller)
    }

    pub async fn login_seller(&self, credentials: Credentials) -> Result<LoginResponse<Seller>> {
        credentials.validate().map_err(|_| EcommerceError::InvalidLogin)?;
        let seller = self.repos.accounts.seller_by_email(&normalize_email(&credentials.email)).await?;
        let seller = check_password(seller, credentials.password, |s| s.password_hash.clone()).await?;
        let issued = self.tokens.issue(seller.id, Role::Seller)?;
        Ok(LoginResponse::new(issued, seller))
    }

    // ---- administrators ----

    /// The first administrator may register freely; after that only an administrator can add another.
    pub async fn register_admin(&self, credentials: Credentials, registered_by: Option<Uuid>) -> Result<Admin> {
        credentials.validate()?;
        if registered_by.is_none() && self.repos.accounts.admin_count().await? > 0 {
            return Err(EcommerceError::Forbidden("Only an administrator can register another administrator".into()));
        }
        if self.repos.accounts.admin_by_email(&normalize_email(&credentials.email)).await?.is_some() {
            return Err(EcommerceError::Conflict("Admin already exists".into()));
        }
        let hash = hash_password(credentials.password).await?;
        let admin = self.repos.accounts.insert_admin(Admin::register(&credentials.email, hash)).await?;
        tracing::info!(admin_id = %admin.id, registered_by = ?registered_by, "administrator registered");
        Ok(admin)
    }

    pub async fn login_admin(&self, credentials: Credentials) -> Result<LoginResponse<Admin>> {
        credentials.validate().map_err(|_| EcommerceError::InvalidLogin)?;
        let admin = self.repos.accounts.admin_by_email(&normalize_email(&credentials.email)).await?;
        let admin = check_password(admin, credentials.password, |a| a.password_hash.clone()).await?;
        let issued = self.tokens.issue(admin.id, Role::Admin)?;
        Ok(LoginResponse::new(issued, admin))
    }

    pub async fn sellers(&self) -> Result<Vec<Seller>> { Ok(self.repos.accounts.sellers().await?) }

    pub async fn set_seller_status(&self, seller_id: Uuid, status: SellerStatus) -> Result<Seller> {
        let mut seller = self.repos.accounts.seller(seller_id).await?
            .ok_or_else(|| EcommerceError::NotFound("Seller".into()))?;
        seller.set_status(status);
        self.repos.accounts.save_seller(&seller).await?;
        tracing::info!(seller_id = %seller.id, status = status.as_str(), "seller status changed");
        self.events.publish(DomainEvent::SellerStatusChanged { seller_id: seller.id, status }).await;
        Ok(seller)
    }

    pub async fn dashboard(&self) -> Result<AdminDashboard> {
        let (sellers, products, total_orders) = try_join!(
            self.repos.accounts.sellers(),
            self.repos.catalog.products(),
            self.repos.orders.order_count(),
        )?;
        Ok(AdminDashboard {
            total_sellers: sellers.len(), total_products: products.len(), total_orders, sellers, products,
        })
    }
}

/// Same error for an unknown email and a wrong password.
async fn check_password<T>(account: Option<T>, password: String, hash_of: impl Fn(&T) -> String) -> Result<T> {
    let Some(account) = account else {
        tracing::warn!("login for unknown email");
        return Err(EcommerceError::InvalidLogin);
    };
    if !verify_password(password, hash_of(&account)).await? {
        tracing::warn!("login with wrong password");
        return Err(EcommerceError::InvalidLogin);
    }
    Ok(account)
}
