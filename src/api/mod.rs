//! HTTP surface

pub mod admin;
pub mod auth;
pub mod customer;
pub mod health;
pub mod registration;
pub mod seller;
pub mod upload;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRef, FromRequest},
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::TokenService;
use crate::config::Config;
use crate::events::EventPublisher;
use crate::notify::Notifier;
use crate::otp::OtpStore;
use crate::services::{AccountService, CartService, CatalogService, CheckoutService, OrderService, RegistrationService};
use crate::store::Repositories;
use crate::upload::ObjectStorage;
use crate::EcommerceError;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub repos: Repositories,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub registration: Arc<RegistrationService>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        tokens: TokenService,
        events: EventPublisher,
        notifier: Arc<dyn Notifier>,
        otps: Arc<dyn OtpStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let tokens = Arc::new(tokens);
        let accounts = Arc::new(AccountService::new(repos.clone(), tokens.clone(), events.clone()));
        Self {
            catalog: Arc::new(CatalogService::new(repos.clone())),
            carts: Arc::new(CartService::new(repos.clone())),
            checkout: Arc::new(CheckoutService::new(repos.clone(), events.clone(), notifier.clone())),
            orders: Arc::new(OrderService::new(repos.clone(), events)),
            registration: Arc::new(RegistrationService::new(otps, notifier, accounts.clone())),
            accounts,
            tokens,
            repos,
            storage,
        }
    }
}

/// JSON body whose rejections use the service's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(EcommerceError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for EcommerceError {
    fn from(rejection: JsonRejection) -> Self { EcommerceError::Validation(rejection.body_text()) }
}

pub fn router(state: AppState, config: &Config) -> Router {
    let customer = Router::new()
        .route("/auth/register", post(auth::register_customer))
        .route("/auth/login", post(auth::login_customer))
        .route("/profile", get(customer::profile).put(customer::update_profile))
        .route("/products/all", get(customer::all_products))
        .route("/products/cart", get(customer::cart))
        .route("/products/cart/add-product", post(customer::add_to_cart))
        .route("/products/cart/remove/:item_id", delete(customer::remove_from_cart))
        .route("/products/purchase-order", post(customer::purchase))
        .route("/products/:id", get(customer::product))
        .route("/orders", get(customer::orders))
        .route("/orders/:order_id", get(customer::order));

    let seller = Router::new()
        .route("/auth/register", post(auth::register_seller))
        .route("/auth/login", post(auth::login_seller))
        .route("/products/add", post(seller::add_product))
        .route("/products/all", get(seller::products))
        .route("/products/update/:id", put(seller::update_product))
        .route("/products/delete/:id", delete(seller::delete_product))
        .route("/products/orders", get(seller::orders))
        .route("/products/orders/:order_id", get(seller::order).put(seller::update_order_status))
        .route("/products/dashboard", get(seller::dashboard));

    let admin = Router::new()
        .route("/register", post(auth::register_admin))
        .route("/login", post(auth::login_admin))
        .route("/sellers", get(admin::sellers))
        .route("/sellers/:id/approve", put(admin::approve_seller))
        .route("/sellers/:id/disabled", put(admin::disable_seller))
        .route("/dashboard", get(admin::dashboard));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/customer", customer)
        .nest("/api/seller", seller)
        .nest("/api/admin", admin)
        .route("/api/register", post(registration::register))
        .route("/api/upload", post(upload::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .route("/purchase-order", post(customer::purchase))
        .route("/orders/:order_id", put(seller::update_order_status))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(cors(config.cors_origin.as_deref()))
        .with_state(state)
}

fn cors(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else { return CorsLayer::permissive() };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any),
        Err(e) => {
            tracing::warn!(%origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}
