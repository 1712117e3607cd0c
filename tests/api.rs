//! End-to-end tests driving the router in-process against the in-memory store

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use marketplace::{
    api::{self, AppState},
    auth::TokenService,
    config::Config,
    domain::aggregates::Role,
    events::EventPublisher,
    notify::LogNotifier,
    otp::MemoryOtpStore,
    store::Repositories,
    upload::LocalStorage,
};

const SECRET: &str = "integration-test-secret-0123456789abcdef";

fn app() -> Router {
    let upload_dir = std::env::temp_dir().join(format!("marketplace-it-{}", uuid::Uuid::new_v4()));
    let config = Config::from_lookup(|key| match key {
        "JWT_SECRET" => Some(SECRET.to_string()),
        "UPLOAD_DIR" => Some(upload_dir.to_string_lossy().into_owned()),
        _ => None,
    })
    .unwrap();
    let state = AppState::new(
        Repositories::in_memory(),
        TokenService::new(config.tokens.clone()),
        EventPublisher::default(),
        Arc::new(LogNotifier),
        Arc::new(MemoryOtpStore::new(config.otp_ttl)),
        Arc::new(LocalStorage::new(&config.upload_dir, config.public_base_url.clone())),
    );
    api::router(state, &config)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, value)
}

fn address() -> Value {
    json!({
        "fullName": "Asha Rao", "phone": "+911234567890", "addressLine1": "12 MG Road", "addressLine2": "Flat 4",
        "city": "Pune", "state": "MH", "postalCode": "411001", "country": "India",
    })
}

struct Market {
    app: Router,
    admin: String,
    seller: String,
    seller_id: String,
    customer: String,
}

async fn login(app: &Router, uri: &str, email: &str, password: &str) -> Value {
    let (status, body) = call(app, Method::POST, uri, None, Some(json!({ "email": email, "password": password }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

/// An approved seller, a customer and an administrator, all logged in.
async fn market() -> Market {
    let app = app();

    let (status, _) = call(&app, Method::POST, "/api/admin/register", None, Some(json!({ "email": "root@example.com", "password": "rootpass" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let admin = login(&app, "/api/admin/login", "root@example.com", "rootpass").await["token"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::POST, "/api/seller/auth/register", None, Some(json!({
        "ownerName": "Ravi", "contactNo": "9999999999", "shopName": "Ravi Traders", "email": "ravi@example.com",
        "password": "sellerpass", "sellerAddress": "Nagpur", "gstNumber": "27AAAAA0000A1Z5", "idProof": "id.png",
        "yearsInBusiness": 4, "customerSupport": "help@ravi.in",
    }))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let seller_id = body["seller"]["id"].as_str().unwrap().to_string();
    let (status, _) = call(&app, Method::PUT, &format!("/api/admin/sellers/{seller_id}/approve"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let seller = login(&app, "/api/seller/auth/login", "ravi@example.com", "sellerpass").await["token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::POST, "/api/customer/auth/register", None, Some(json!({
        "name": "Meera", "email": "meera@example.com", "phone": "9876543210", "password": "buyerpass",
    }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let customer = login(&app, "/api/customer/auth/login", "meera@example.com", "buyerpass").await["token"].as_str().unwrap().to_string();

    Market { app, admin, seller, seller_id, customer }
}

impl Market {
    async fn product(&self, name: &str, price: f64, stock: i32) -> String {
        let (status, body) = call(&self.app, Method::POST, "/api/seller/products/add", Some(&self.seller), Some(json!({
            "name": name, "description": "test product", "price": price, "category": "Home", "stock": stock, "brand": "Acme",
        }))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["product"]["id"].as_str().unwrap().to_string()
    }

    async fn stock(&self, id: &str) -> i64 {
        let (_, body) = call(&self.app, Method::GET, &format!("/api/customer/products/{id}"), None, None).await;
        body["stock"].as_i64().unwrap()
    }

    async fn purchase(&self, lines: Value) -> (StatusCode, Value) {
        call(&self.app, Method::POST, "/api/customer/products/purchase-order", Some(&self.customer), Some(json!({
            "sellerId": self.seller_id, "shippingAddress": address(), "products": lines,
        }))).await
    }
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = call(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn credentials_are_scoped_by_role() {
    let m = market().await;
    let (status, body) = call(&m.app, Method::GET, "/api/seller/products/all", Some(&m.customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "wrong_role");

    let (status, body) = call(&m.app, Method::GET, "/api/admin/sellers", Some(&m.customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "wrong_role");

    let (status, body) = call(&m.app, Method::GET, "/api/customer/products/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_credential");

    let (status, body) = call(&m.app, Method::GET, "/api/customer/products/cart", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credential");
}

#[tokio::test]
async fn expired_credential_has_its_own_code() {
    let app = app();
    let tokens = TokenService::new(Config::from_lookup(|k| (k == "JWT_SECRET").then(|| SECRET.to_string())).unwrap().tokens);
    let expired = tokens.issue_with_lifetime(uuid::Uuid::new_v4(), Role::Customer, chrono::Duration::seconds(-60)).unwrap().token;
    let (status, body) = call(&app, Method::GET, "/api/customer/products/cart", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "credential_expired");
}

#[tokio::test]
async fn unapproved_seller_cannot_list_products() {
    let m = market().await;
    let (status, _) = call(&m.app, Method::PUT, &format!("/api/admin/sellers/{}/disabled", m.seller_id), Some(&m.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&m.app, Method::POST, "/api/seller/products/add", Some(&m.seller), Some(json!({
        "name": "Lamp", "description": "d", "price": 10.0, "category": "Home", "stock": 1, "brand": "Acme",
    }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "seller_not_approved");
}

#[tokio::test]
async fn purchase_reserves_stock_and_records_order() {
    let m = market().await;
    let a = m.product("Kettle", 12.5, 10).await;
    let b = m.product("Mug", 4.0, 3).await;

    let (status, body) = m.purchase(json!([{ "productId": a, "quantity": 2 }, { "productId": b, "quantity": 3 }])).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["totalAmount"].as_f64().unwrap(), 37.0);
    assert_eq!(body["updatedProducts"].as_array().unwrap().len(), 2);
    assert_eq!(m.stock(&a).await, 8);
    assert_eq!(m.stock(&b).await, 0);

    let order_id = body["order"]["id"].as_str().unwrap();
    let (status, fetched) = call(&m.app, Method::GET, &format!("/api/customer/orders/{order_id}"), Some(&m.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["shippingAddress"], address());
    assert_eq!(fetched["status"], "Pending");
    assert_eq!(fetched["paymentStatus"], "Pending");
}

#[tokio::test]
async fn failed_line_leaves_stock_untouched() {
    let m = market().await;
    let a = m.product("A", 1.0, 5).await;
    let b = m.product("B", 1.0, 1).await;

    let (status, body) = m.purchase(json!([{ "productId": a, "quantity": 2 }, { "productId": b, "quantity": 100 }])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "insufficient_stock");
    assert!(body["message"].as_str().unwrap().contains('B'));
    assert_eq!(m.stock(&a).await, 5);

    let (_, orders) = call(&m.app, Method::GET, "/api/customer/orders", Some(&m.customer), None).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_and_unknown_products_are_distinguished() {
    let m = market().await;
    let (status, body) = m.purchase(json!([{ "productId": "not-an-id" }])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");

    let (status, body) = m.purchase(json!([{ "productId": uuid::Uuid::new_v4() }])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn concurrent_purchases_over_http_never_oversell() {
    let m = Arc::new(market().await);
    let a = m.product("Limited", 1.0, 5).await;
    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let m = m.clone();
            let a = a.clone();
            tokio::spawn(async move { m.purchase(json!([{ "productId": a, "quantity": 3 }])).await.0 })
        })
        .collect();
    let mut statuses = Vec::new();
    for attempt in attempts { statuses.push(attempt.await.unwrap().as_u16()); }
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 400]);
    assert_eq!(m.stock(&a).await, 2);
}

#[tokio::test]
async fn cart_replaces_quantities_and_drops_zero() {
    let m = market().await;
    let p = m.product("Lamp", 5.0, 10).await;
    let add = |q: Value| call(&m.app, Method::POST, "/api/customer/products/cart/add-product", Some(&m.customer), Some(json!({ "productId": p, "quantity": q })));

    let (status, _) = add(json!(2)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, cart) = add(json!(5)).await;
    assert_eq!(cart["cartItems"].as_array().unwrap().len(), 1);
    assert_eq!(cart["cartItems"][0]["quantity"], 5);
    assert_eq!(cart["cartItems"][0]["product"]["name"], "Lamp");

    add(json!(0)).await;
    let (_, cart) = call(&m.app, Method::GET, "/api/customer/products/cart", Some(&m.customer), None).await;
    assert!(cart["cartItems"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn order_status_follows_the_state_machine() {
    let m = market().await;
    let p = m.product("Desk", 100.0, 2).await;
    let (_, body) = m.purchase(json!([{ "productId": p }])).await;
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&m.app, Method::PUT, &format!("/orders/{order_id}"), Some(&m.seller), Some(json!({ "status": "Delivered", "paymentStatus": "Completed" }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["status"], "Delivered");

    let (status, body) = call(&m.app, Method::PUT, &format!("/api/seller/products/orders/{order_id}"), Some(&m.seller), Some(json!({ "status": "Pending" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (status, _) = call(&m.app, Method::PUT, &format!("/orders/{order_id}"), Some(&m.customer), Some(json!({ "status": "Shipped" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, dash) = call(&m.app, Method::GET, "/api/seller/products/dashboard", Some(&m.seller), None).await;
    assert_eq!(dash["totalSales"].as_f64().unwrap(), 100.0);
    assert_eq!(dash["totalOrders"], 1);
}

#[tokio::test]
async fn second_admin_needs_an_admin_credential() {
    let m = market().await;
    let creds = json!({ "email": "second@example.com", "password": "secondpass" });
    let (status, _) = call(&m.app, Method::POST, "/api/admin/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&m.app, Method::POST, "/api/admin/register", Some(&m.admin), Some(creds)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let m = market().await;
    let (status, body) = call(&m.app, Method::PUT, "/orders/whatever", Some(&m.seller), Some(json!({ "status": "Teleported" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}
