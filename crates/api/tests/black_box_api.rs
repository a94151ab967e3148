//! Black-box tests: the real router on an ephemeral port, driven over HTTP.

use chrono::{Duration as ChronoDuration, Utc};
use forgepos_auth::{JwtClaims, Role};
use forgepos_core::{TenantId, UserId};
use forgepos_infra::AppConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = AppConfig {
            jwt_secret: SECRET.to_string(),
            jwt_secret_configured: true,
            ..AppConfig::default()
        };
        let app = forgepos_api::app::build_app(&config).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, role: Role, name: &str) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles: vec![role],
        name: Some(name.to_string()),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn create_product(server: &TestServer, token: &str, sku: &str, stock: i64) -> String {
    let (status, body) = server
        .post(
            token,
            "/products",
            json!({
                "sku": sku,
                "name": format!("Item {sku}"),
                "price": 450,
                "cost": 200,
                "initial_stock": stock,
                "low_stock_threshold": 3
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["product_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["errors"][0], "missing bearer token");

    let (status, _) = server.get("not-a-jwt", "/products").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reports_the_token_principal() {
    let server = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, Role::CASHIER, "Sam Till");

    let (status, body) = server.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tenant_id"], tenant_id.to_string());
    assert_eq!(body["data"]["display_name"], "Sam Till");
    assert_eq!(body["data"]["roles"], json!(["cashier"]));
}

#[tokio::test]
async fn checkout_decrements_stock_and_records_the_sale() {
    let server = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let manager = mint_jwt(tenant_id, Role::MANAGER, "Morgan");
    let cashier = mint_jwt(tenant_id, Role::CASHIER, "Sam Till");
    let product_id = create_product(&server, &manager, "LATTE", 10).await;

    let cart = json!({
        "items": [{ "product_id": product_id, "quantity": 3 }],
        "payment": { "method": "cash", "amount_paid": 2000 }
    });

    let (status, quote) = server.post(&cashier, "/checkout/quote", cart.clone()).await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(quote["data"]["total"], 1350);
    assert_eq!(quote["data"]["change"], 650);

    let (status, sale) = server.post(&cashier, "/checkout", cart).await;
    assert_eq!(status, StatusCode::CREATED, "{sale}");
    assert_eq!(sale["data"]["total"], 1350);
    assert_eq!(sale["data"]["cashier_name"], "Sam Till");
    let transaction_id = sale["data"]["transaction_id"].as_str().unwrap().to_string();

    let (_, product) = server.get(&cashier, &format!("/products/{product_id}")).await;
    assert_eq!(product["data"]["stock"], 7);

    let (status, history) = server.get(&cashier, "/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);

    let (status, fetched) = server.get(&cashier, &format!("/transactions/{transaction_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["lines"][0]["quantity"], 3);

    let (_, adjustments) = server.get(&manager, "/inventory/adjustments?adjustment_type=sale").await;
    assert_eq!(adjustments["data"][0]["adjustment_quantity"], -3);
    assert_eq!(adjustments["data"][0]["new_stock"], 7);
}

#[tokio::test]
async fn insufficient_stock_is_unprocessable() {
    let server = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let manager = mint_jwt(tenant_id, Role::MANAGER, "Morgan");
    let product_id = create_product(&server, &manager, "RARE", 1).await;

    let (status, body) = server
        .post(
            &manager,
            "/checkout",
            json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "payment": { "method": "card" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["status"], "error");

    let (_, product) = server.get(&manager, &format!("/products/{product_id}")).await;
    assert_eq!(product["data"]["stock"], 1);
}

#[tokio::test]
async fn cashiers_cannot_manage_the_catalog() {
    let server = TestServer::spawn().await;
    let cashier = mint_jwt(TenantId::new(), Role::CASHIER, "Sam Till");

    let (status, body) = server
        .post(&cashier, "/products", json!({ "sku": "X", "name": "X", "price": 1, "cost": 1 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _) = server.get(&cashier, "/reports/sales-summary").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server.get(&cashier, "/suppliers").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server.get(&cashier, "/customers").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ids_of_the_wrong_kind_are_not_found() {
    let server = TestServer::spawn().await;
    let manager = mint_jwt(TenantId::new(), Role::MANAGER, "Morgan");
    let product_id = create_product(&server, &manager, "CUP", 3).await;

    let (status, body) = server
        .post(
            &manager,
            "/checkout",
            json!({
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "payment": { "method": "card" },
                "customer_id": product_id
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, body) = server
        .post(
            &manager,
            "/products",
            json!({ "sku": "SAUCER", "name": "Saucer", "price": 1, "cost": 1, "category_id": product_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn malformed_input_is_a_bad_request_envelope() {
    let server = TestServer::spawn().await;
    let manager = mint_jwt(TenantId::new(), Role::MANAGER, "Morgan");

    let (status, body) = server.post(&manager, "/products", json!({ "sku": "NO-PRICE" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(!body["errors"][0].as_str().unwrap().is_empty());

    let (status, _) = server.get(&manager, "/products/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post(
            &manager,
            "/products",
            json!({ "sku": "NEG", "name": "Negative", "price": -5, "cost": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_sku_conflicts() {
    let server = TestServer::spawn().await;
    let manager = mint_jwt(TenantId::new(), Role::MANAGER, "Morgan");
    create_product(&server, &manager, "DUP", 1).await;

    let (status, _) = server
        .post(&manager, "/products", json!({ "sku": "dup", "name": "Again", "price": 1, "cost": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn suppliers_and_customers_are_separate_collections() {
    let server = TestServer::spawn().await;
    let manager = mint_jwt(TenantId::new(), Role::MANAGER, "Morgan");

    let (status, body) = server
        .post(&manager, "/suppliers", json!({ "name": "Bean Co" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let supplier_id = body["data"]["party_id"].as_str().unwrap().to_string();

    let (status, _) = server.get(&manager, &format!("/customers/{supplier_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, customers) = server.get(&manager, "/customers").await;
    assert!(customers["data"].as_array().unwrap().is_empty());

    let (status, suspended) = server
        .post(&manager, &format!("/suppliers/{supplier_id}/suspend"), json!({ "reason": "late" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{suspended}");
}

#[tokio::test]
async fn reports_cover_completed_sales() {
    let server = TestServer::spawn().await;
    let manager = mint_jwt(TenantId::new(), Role::MANAGER, "Morgan");
    let product_id = create_product(&server, &manager, "MUG", 4).await;

    let (status, _) = server
        .post(
            &manager,
            "/checkout",
            json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "payment": { "method": "card" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, summary) = server.get(&manager, "/reports/sales-summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data"]["transaction_count"], 1);
    assert_eq!(summary["data"]["net_revenue"], 900);
    assert_eq!(summary["data"]["gross_profit"], 500);

    let (_, top) = server.get(&manager, "/reports/top-products").await;
    assert_eq!(top["data"][0]["units"], 2);

    let (_, low) = server.get(&manager, "/reports/low-stock").await;
    assert_eq!(low["data"][0]["product_id"], product_id);
}

#[tokio::test]
async fn unknown_routes_use_the_envelope() {
    let server = TestServer::spawn().await;
    let res = server.client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
}
