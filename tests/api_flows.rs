//! End-to-end flows over HTTP against the in-memory store.
//!
//! Each test starts the full router on an ephemeral port and drives it with
//! a plain reqwest client, the way a storefront would.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use palace::account::TokenIssuer;
use palace::notify::ResetNotifier;
use palace::payments::MockGateway;
use palace::{AppState, MemoryStore, build_router};

/// Keeps every reset code instead of mailing it
#[derive(Default)]
struct CapturingNotifier {
    codes: Mutex<Vec<(String, String)>>,
}

impl CapturingNotifier {
    fn code_for(&self, email: &str) -> Option<String> {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(e, _)| e == email)
            .map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl ResetNotifier for CapturingNotifier {
    async fn send_reset_code(&self, email: &str, _first_name: &str, code: &str) -> Result<()> {
        self.codes
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

struct TestApp {
    base: String,
    client: reqwest::Client,
    notifier: Arc<CapturingNotifier>,
    gateway: Arc<MockGateway>,
    state: Arc<AppState>,
}

async fn spawn_app() -> TestApp {
    let notifier = Arc::new(CapturingNotifier::default());
    let gateway = Arc::new(MockGateway::new());
    let state = Arc::new(AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(TokenIssuer::new("integration-secret", 1)),
        notifier.clone(),
        gateway.clone(),
        15,
        false,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
        notifier,
        gateway,
        state,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        let value = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, token, None).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, token, Some(body)).await
    }

    async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, token, Some(body)).await
    }

    async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, token, None).await
    }

    async fn register(&self, email: &str, phone: &str, role: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/user",
            None,
            json!({
                "first_name": "Test",
                "last_name": "User",
                "email": email,
                "phone_number": phone,
                "password": "password123",
                "role": role,
            }),
        )
        .await
    }

    async fn login(&self, phone: &str, password: &str, role: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/user/login",
            None,
            json!({"phone_number": phone, "password": password, "role": role}),
        )
        .await
    }

    /// Register and log in, returning the bearer token and user id
    async fn user(&self, email: &str, phone: &str, role: &str) -> (String, String) {
        let (status, body) = self.register(email, phone, role).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let (status, body) = self.login(phone, "password123", role).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (
            body["data"]["token"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Bootstrap an admin the way startup does, then log in
    async fn admin(&self, email: &str, phone: &str) -> String {
        let req = serde_json::from_value(json!({
            "first_name": "Admin",
            "last_name": "User",
            "email": email,
            "phone_number": phone,
            "password": "password123",
        }))
        .unwrap();
        self.state.users.ensure_admin(req).await.unwrap();
        let (status, body) = self.login(phone, "password123", "admin").await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn product(&self, seller: &str, name: &str, price: &str, stock: i32) -> String {
        let (status, body) = self
            .post(
                "/api/v1/products",
                Some(seller),
                json!({"name": name, "price": price, "category": "Dresses", "stock": stock}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn stock(&self, product_id: &str) -> i64 {
        let (_, body) = self.get(&format!("/api/v1/products/{}", product_id), None).await;
        body["data"]["stock"].as_i64().unwrap()
    }
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

#[tokio::test]
async fn test_health_and_docs() {
    let app = spawn_app().await;
    let (status, body) = app.get("/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["timestamp_ms"].as_i64().unwrap() > 0);

    let (status, body) = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/cart/checkout"].is_object());
}

#[tokio::test]
async fn test_duplicate_phone_and_role_conflicts() {
    let app = spawn_app().await;
    let (status, _) = app.register("a@example.com", "0712345678", "customer").await;
    assert_eq!(status, StatusCode::CREATED);

    // Same phone in another format, same role
    let (status, body) = app.register("b@example.com", "+254712345678", "customer").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    // Same phone, different role is a separate account
    let (status, _) = app.register("c@example.com", "0712345678", "seller").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_login_sets_cookie_and_logout_revokes() {
    let app = spawn_app().await;
    app.register("a@example.com", "0712345678", "customer").await;

    let resp = app
        .client
        .post(format!("{}/api/v1/user/login", app.base))
        .json(&json!({"phone_number": "0712345678", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("Authorization="));
    assert!(cookie.contains("HttpOnly"));

    // The cookie alone authenticates
    let pair = cookie.split(';').next().unwrap().to_string();
    let resp = app
        .client
        .get(format!("{}/api/v1/user", app.base))
        .header(reqwest::header::COOKIE, &pair)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let token = pair.trim_start_matches("Authorization=").to_string();
    let (status, _) = app
        .send(reqwest::Method::POST, "/api/v1/user/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/v1/user", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user() {
    let app = spawn_app().await;
    app.register("a@example.com", "0712345678", "customer").await;

    let (status, _) = app.login("0712345678", "not-the-password", "customer").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("0712345678", "password123", "seller").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/v1/cart", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = spawn_app().await;
    app.register("amina@example.com", "0712345678", "customer").await;

    let (status, _) = app
        .post(
            "/api/v1/user/forgot-password",
            None,
            json!({"email": "amina@example.com", "phone_number": "0712345678"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Delivery is spawned; wait for it
    let mut code = None;
    for _ in 0..50 {
        code = app.notifier.code_for("amina@example.com");
        if code.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let code = code.expect("reset code delivered");
    assert_eq!(code.len(), 4);

    let wrong = if code == "0000" { "1111" } else { "0000" };
    let (status, _) = app
        .post(
            "/api/v1/user/reset-password",
            None,
            json!({
                "email": "amina@example.com",
                "phone_number": "0712345678",
                "code": wrong,
                "new_password": "newpassword1",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.login("0712345678", "password123", "customer").await;
    assert_eq!(status, StatusCode::OK, "password unchanged after a bad code");

    let (status, _) = app
        .post(
            "/api/v1/user/reset-password",
            None,
            json!({
                "email": "amina@example.com",
                "phone_number": "0712345678",
                "code": code,
                "new_password": "newpassword1",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("0712345678", "newpassword1", "customer").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("0712345678", "password123", "customer").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customers_cannot_sell() {
    let app = spawn_app().await;
    let (customer, _) = app.user("c@example.com", "0711000001", "customer").await;
    let (status, _) = app
        .post(
            "/api/v1/products",
            Some(&customer),
            json!({"name": "Scarf", "price": "5.00", "stock": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_catalog_listing_and_alias() {
    let app = spawn_app().await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let cheap = app.product(&seller, "Scarf", "10.00", 5).await;
    app.product(&seller, "Dress", "20.00", 5).await;

    let (status, body) = app.get("/api/v1/products/price?maxPrice=15", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], cheap.as_str());

    let (_, body) = app
        .get("/api/v1/clothes/category?categories=dresses,shoes", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app.delete(&format!("/api/v1/clothes/{}", cheap), Some(&seller)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/v1/products/{}", cheap), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_totals_follow_every_change() {
    let app = spawn_app().await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let ten = app.product(&seller, "Scarf", "10.00", 10).await;
    let twenty = app.product(&seller, "Dress", "20.00", 10).await;

    let (status, body) = app.get("/api/v1/cart", Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["total_amount"]), Decimal::ZERO);

    app.post("/api/v1/cart", Some(&buyer), json!({"product_id": ten, "quantity": 2}))
        .await;
    let (status, body) = app
        .post("/api/v1/cart", Some(&buyer), json!({"product_id": twenty, "quantity": 1}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["data"]["total_amount"]), Decimal::from(40));

    let scarf_item = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["product_id"] == ten.as_str())
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (_, body) = app
        .put(
            &format!("/api/v1/cart/items/{}", scarf_item),
            Some(&buyer),
            json!({"quantity": 5}),
        )
        .await;
    assert_eq!(decimal(&body["data"]["total_amount"]), Decimal::from(70));

    let (_, body) = app
        .delete(&format!("/api/v1/cart/items/{}", scarf_item), Some(&buyer))
        .await;
    assert_eq!(decimal(&body["data"]["total_amount"]), Decimal::from(20));

    let (status, _) = app
        .post("/api/v1/cart", Some(&buyer), json!({"product_id": ten, "quantity": 0}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_consumes_cart_and_stock() {
    let app = spawn_app().await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let product = app.product(&seller, "Scarf", "10.00", 10).await;

    let checkout = json!({"shipping_address": "Moi Avenue", "payment_method": "M-Pesa"});
    let (status, _) = app
        .post("/api/v1/cart/checkout", Some(&buyer), checkout.clone())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.post("/api/v1/cart", Some(&buyer), json!({"product_id": product, "quantity": 3}))
        .await;
    let (status, body) = app
        .post("/api/v1/cart/checkout", Some(&buyer), checkout)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(decimal(&body["data"]["total_amount"]), Decimal::from(30));
    assert_eq!(body["data"]["payment_status"], "Pending");
    assert_eq!(body["data"]["order_status"], "Processing");

    assert_eq!(app.stock(&product).await, 7);
    let (_, body) = app.get("/api/v1/cart", Some(&buyer)).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert!(body["data"]["cart_id"].is_null());
}

#[tokio::test]
async fn test_order_rolls_back_when_stock_is_short() {
    let app = spawn_app().await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let plenty = app.product(&seller, "Scarf", "10.00", 10).await;
    let scarce = app.product(&seller, "Dress", "20.00", 1).await;

    let (status, _) = app
        .post(
            "/api/v1/orders",
            Some(&buyer),
            json!({
                "items": [
                    {"product_id": plenty, "quantity": 4},
                    {"product_id": scarce, "quantity": 2}
                ],
                "shipping_address": "Moi Avenue",
                "payment_method": "M-Pesa",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.stock(&plenty).await, 10);
    assert_eq!(app.stock(&scarce).await, 1);

    let (_, body) = app.get("/api/v1/orders/mine", Some(&buyer)).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app
        .post(
            "/api/v1/orders",
            Some(&buyer),
            json!({
                "items": [
                    {"product_id": plenty, "quantity": 4},
                    {"product_id": scarce, "quantity": 1}
                ],
                "shipping_address": "Moi Avenue",
                "payment_method": "M-Pesa",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["data"]["total_amount"]), Decimal::from(60));
    assert_eq!(app.stock(&plenty).await, 6);
    assert_eq!(app.stock(&scarce).await, 0);
}

#[tokio::test]
async fn test_admin_order_management() {
    let app = spawn_app().await;
    let admin = app.admin("admin@example.com", "0711000009").await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let (other, _) = app.user("o@example.com", "0711000004", "customer").await;
    let product = app.product(&seller, "Scarf", "10.00", 10).await;

    let (_, body) = app
        .post(
            "/api/v1/orders",
            Some(&buyer),
            json!({
                "items": [{"product_id": product, "quantity": 2}],
                "shipping_address": "Moi Avenue",
                "payment_method": "Cash",
            }),
        )
        .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.get("/api/v1/orders", Some(&buyer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .get(&format!("/api/v1/orders/{}", order_id), Some(&other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/v1/orders?period=today", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["total_orders"], 1);
    assert_eq!(body["data"]["meta"]["total_items"], 2);
    assert_eq!(decimal(&body["data"]["meta"]["total_revenue"]), Decimal::from(20));

    let (_, body) = app.get("/api/v1/orders?period=yesterday", Some(&admin)).await;
    assert_eq!(body["data"]["meta"]["total_orders"], 0);
    let (status, _) = app
        .get("/api/v1/orders?period=custom&from=2024-13-01", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let path = format!("/api/v1/orders/{}/status", order_id);
    let (status, body) = app
        .send(
            reqwest::Method::PATCH,
            &path,
            Some(&admin),
            Some(json!({"order_status": "Delivered"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["delivered_at"].is_string());

    let (status, _) = app
        .send(
            reqwest::Method::PATCH,
            &path,
            Some(&admin),
            Some(json!({"order_status": "Shipped"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_seller_ratings() {
    let app = spawn_app().await;
    let (seller, seller_id) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let path = format!("/api/v1/products/ratings/{}", seller_id);

    for stars in [0, 6] {
        let (status, _) = app.post(&path, Some(&buyer), json!({"stars": stars})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "stars = {}", stars);
    }
    let (status, _) = app
        .post(&path, Some(&buyer), json!({"stars": 3, "comment": "Quick delivery"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&path, Some(&seller), json!({"stars": 5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get(
            &format!("/api/v1/products/ratings?seller_id={}&limit=10&page=1", seller_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["total"], 1);
    assert_eq!(body["data"]["ratings"][0]["stars"], 3);
}

#[tokio::test]
async fn test_payment_callback_is_idempotent() {
    let app = spawn_app().await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let product = app.product(&seller, "Scarf", "150.00", 10).await;

    let (_, body) = app
        .post(
            "/api/v1/orders",
            Some(&buyer),
            json!({
                "items": [{"product_id": product, "quantity": 1}],
                "shipping_address": "Moi Avenue",
                "payment_method": "M-Pesa",
            }),
        )
        .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    let order_number = body["data"]["order_number"].as_str().unwrap().to_string();

    // Someone else's order, and an amount short of the total
    let (other, _) = app.user("o@example.com", "0711000004", "customer").await;
    let (status, _) = app
        .post(
            "/api/v1/payments",
            Some(&other),
            json!({"phone_number": "0711000004", "amount": "150.00", "account_reference": order_number}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(
            "/api/v1/payments",
            Some(&buyer),
            json!({"phone_number": "0711000003", "amount": "1", "account_reference": order_number}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.gateway.requests().is_empty());

    let (status, body) = app
        .post(
            "/api/v1/payments",
            Some(&buyer),
            json!({"phone_number": "0711000003", "amount": "150.00", "account_reference": order_number}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let checkout_id = body["data"]["checkout_request_id"].as_str().unwrap().to_string();
    assert_eq!(app.gateway.requests()[0].phone, "254711000003");

    let callback = json!({"Body": {"stkCallback": {
        "MerchantRequestID": "m-1",
        "CheckoutRequestID": checkout_id,
        "ResultCode": 0,
        "ResultDesc": "The service request is processed successfully.",
        "CallbackMetadata": {"Item": [
            {"Name": "Amount", "Value": 150},
            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
            {"Name": "TransactionDate", "Value": 20240101120000u64},
            {"Name": "PhoneNumber", "Value": 254711000003u64}
        ]}}}});

    let (status, first) = app.post("/api/v1/callback", None, callback.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["ResultCode"], 0);
    let (status, second) = app.post("/api/v1/callback", None, callback).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["payment"]["id"], second["payment"]["id"]);

    let (_, body) = app.get("/api/v1/payments", Some(&buyer)).await;
    let payments = body["data"].as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["transaction_id"], "NLJ7RT61SV");
    assert_eq!(payments[0]["status"], "Completed");

    let (_, body) = app
        .get(&format!("/api/v1/orders/{}", order_id), Some(&buyer))
        .await;
    assert_eq!(body["data"]["payment_status"], "Paid");

    let (status, _) = app.post("/api/v1/callback", None, json!({"Body": {}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_role_cannot_self_register() {
    let app = spawn_app().await;
    let (status, body) = app.register("x@example.com", "0711000008", "admin").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = app.login("0711000008", "password123", "admin").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let app = spawn_app().await;
    let (seller, _) = app.user("s@example.com", "0711000002", "seller").await;
    let (buyer, _) = app.user("b@example.com", "0711000003", "customer").await;
    let product = app.product(&seller, "Scarf", "10.00", 10).await;

    let (status, body) = app
        .post(
            "/api/v1/orders",
            Some(&buyer),
            json!({"items": [{"product_id": product, "quantity": 1}], "payment_method": "Cash"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("shipping_address"));
    assert_eq!(app.stock(&product).await, 10);

    let (status, body) = app.get("/api/v1/orders/not-a-uuid", Some(&buyer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
