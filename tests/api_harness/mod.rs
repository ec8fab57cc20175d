//! HTTP test infrastructure shared by the API test suites.
//!
//! A [`TestApp`] is a complete router over a fresh in-memory database, with
//! images written to a temporary directory and an admin account seeded the
//! same way the binary seeds one at startup.
//!
//! ```text
//! axum_test::TestServer
//!     └─ Router (ServerBuilder::build)
//!         ├─ InMemoryDatabase
//!         └─ LocalImageStore ─▶ TempDir
//! ```

#![allow(dead_code)]

use axum_test::{TestResponse, TestServer};
use serde_json::{Value, json};
use tempfile::TempDir;

use storefront::accounts::seed_admin;
use storefront::config::{AppConfig, ImageStorageConfig, SeedAdmin};
use storefront::core::{PasswordService, Stores};
use storefront::server::ServerBuilder;
use storefront::storage::InMemoryDatabase;

pub const ADMIN_EMAIL: &str = "admin@storefront.test";
pub const ADMIN_PASSWORD: &str = "admin-pass-1";
pub const PASSWORD: &str = "secret-pass-1";

/// Cheap hashing parameters so the suites stay fast
pub fn test_config(uploads: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.argon2_memory_kib = 256;
    config.auth.argon2_iterations = 1;
    config.cache.purge_interval_secs = 0;
    config.images.storage = ImageStorageConfig::Local {
        dir: uploads.path().to_path_buf(),
        public_base_url: "/uploads".to_string(),
    };
    config
}

pub struct TestApp {
    pub server: TestServer,
    pub stores: Stores,
    pub admin_token: String,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build an app after adjusting the default test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let uploads = TempDir::new().expect("Failed to create upload dir");
        let mut config = test_config(&uploads);
        adjust(&mut config);

        let stores = InMemoryDatabase::new().stores();
        let passwords = PasswordService::new(&config.auth).expect("Invalid argon2 params");
        let seed = SeedAdmin {
            name: "Admin".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        };
        seed_admin(stores.users.as_ref(), &passwords, &seed)
            .await
            .expect("Failed to seed admin");

        let app = ServerBuilder::new(config)
            .with_stores(stores.clone())
            .build()
            .expect("Failed to build app");
        let server = TestServer::try_new(app).expect("Failed to create test server");

        let admin_token = login(&server, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        Self {
            server,
            stores,
            admin_token,
            uploads,
        }
    }

    /// Register a customer and return their token
    pub async fn register(&self, name: &str, email: &str) -> String {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        token_of(&response)
    }

    /// Create a product as admin and return its envelope object
    pub async fn create_product(&self, name: &str, price_cents: i64, stock: u32) -> Value {
        self.create_product_in(name, "general", price_cents, stock).await
    }

    pub async fn create_product_in(
        &self,
        name: &str,
        category: &str,
        price_cents: i64,
        stock: u32,
    ) -> Value {
        let response = self
            .server
            .post("/api/products")
            .authorization_bearer(&self.admin_token)
            .json(&json!({
                "name": name,
                "description": format!("{name} description"),
                "price_cents": price_cents,
                "category": category,
                "stock": stock,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["object"].clone()
    }

    /// Current stock of a product, read through the API
    pub async fn stock_of(&self, product_id: &str) -> u64 {
        let body: Value = self
            .server
            .get(&format!("/api/products/{product_id}"))
            .await
            .json();
        body["object"]["stock"].as_u64().expect("stock missing")
    }

    pub async fn place_order(&self, token: &str, items: Value) -> TestResponse {
        self.server
            .post("/api/orders")
            .authorization_bearer(token)
            .json(&json!({ "items": items, "shipping_address": address() }))
            .await
    }
}

pub async fn login(server: &TestServer, email: &str, password: &str) -> String {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .await;
    response.assert_status_ok();
    token_of(&response)
}

pub fn token_of(response: &TestResponse) -> String {
    response.json::<Value>()["object"]["token"]
        .as_str()
        .expect("token missing")
        .to_string()
}

pub fn address() -> Value {
    json!({
        "recipient": "Ada Lovelace",
        "line1": "12 Analytical St",
        "city": "London",
        "postal_code": "N1 9GU",
        "country": "GB",
    })
}

/// The `object.code` of a failure envelope
pub fn error_code(body: &Value) -> &str {
    assert_eq!(body["success"], false, "expected a failure envelope: {body}");
    body["object"]["code"].as_str().unwrap_or_default()
}

/// The `x-cache` header of a catalog read
pub fn cache_status(response: &TestResponse) -> String {
    response
        .header("x-cache")
        .to_str()
        .expect("x-cache is not ASCII")
        .to_string()
}
