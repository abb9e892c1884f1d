//! End-to-end test helpers for the Garden Companion API.
//!
//! # Running Tests
//!
//! ```bash
//! # Apply migrations and start the server against PostgreSQL
//! cargo run -p garden-cli -- migrate
//! cargo run -p garden-api
//!
//! # Run the ignored end-to-end tests
//! cargo test -p garden-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `GARDEN_API_URL` - Base URL of the running server (default: <http://localhost:8080>)
//! - `GARDEN_DATABASE_URL` - Same database the server uses; needed for
//!   out-of-band steps such as promoting an admin

use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use garden_api::config::DatabaseConfig;
use garden_api::db::{Store, create_pool};

/// Password used for every account the tests create.
pub const TEST_PASSWORD: &str = "seedlings2grow";

/// Base URL of the server under test.
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("GARDEN_API_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string())
        .trim_end_matches('/')
        .to_owned()
}

/// A unique email so runs do not collide with earlier data.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}+{}@garden.test", uuid::Uuid::new_v4().simple())
}

/// Token and profile returned by register and login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: Value,
}

/// HTTP client plus a store handle on the server's database.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub store: Store,
}

impl TestContext {
    /// Connect to the server and its database.
    ///
    /// # Panics
    ///
    /// Panics if the database URL is missing or unreachable.
    pub async fn new() -> Self {
        let url = std::env::var("GARDEN_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("GARDEN_DATABASE_URL must point at the server's database");
        let pool = create_pool(&DatabaseConfig {
            url: SecretString::from(url),
            name: std::env::var("GARDEN_DATABASE_NAME").ok(),
        })
        .await
        .expect("Failed to connect to test database");

        Self {
            client: Client::new(),
            base_url: api_base_url(),
            store: Store::postgres(pool),
        }
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register an account and return its session.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the server refuses the registration.
    pub async fn register(&self, email: &str, referral_code: Option<&str>) -> Session {
        let mut body = serde_json::json!({
            "email": email,
            "password": TEST_PASSWORD,
            "name": "Test Gardener",
        });
        if let Some(code) = referral_code {
            body["referralCode"] = Value::from(code);
        }

        let resp = self
            .client
            .post(self.url("/api/v1/auth/register"))
            .json(&body)
            .send()
            .await
            .expect("Failed to send register request");
        assert_eq!(resp.status(), StatusCode::OK, "registration refused");
        resp.json().await.expect("Failed to decode session")
    }

    /// GET an authenticated path and return status and JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await.expect("Failed to send request");
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}
