//! Router-level tests against the in-memory store.
//!
//! Each test builds a fresh application and drives it with `oneshot`, so no
//! network or database is needed.

#![allow(clippy::unwrap_used)]

use argon2::Params;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use garden_api::config::{DatabaseConfig, GardenConfig, TokenConfig};
use garden_api::db::Store;
use garden_api::services::auth::HashingPool;
use garden_api::services::referral::{ActivationOutcome, RewardPolicy};
use garden_api::state::AppState;
use garden_core::{Email, UserId};

const PASSWORD: &str = "tomatoes4ever";

fn test_config() -> GardenConfig {
    GardenConfig {
        database: DatabaseConfig {
            url: SecretString::from("memory://"),
            name: None,
        },
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        public_url: "https://garden.test".to_owned(),
        token: TokenConfig {
            secret: SecretString::from("kT9#vQ2!mZ7@pL4$wX8^nR3&bY6*cH1%"),
            ttl: chrono::Duration::hours(1),
        },
        hash_workers: 2,
        rewards: RewardPolicy::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let hasher = HashingPool::with_params(2, Params::new(8, 1, 1, None).unwrap()).unwrap();
        let state = AppState::with_hasher(test_config(), Store::in_memory(), hasher).unwrap();
        Self {
            router: garden_api::app(state.clone()),
            state,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Register and return `(token, user_id)`.
    async fn register(&self, email: &str, name: &str, referral_code: Option<&str>) -> (String, UserId) {
        let mut body = json!({ "email": email, "password": PASSWORD, "name": name });
        if let Some(code) = referral_code {
            body["referralCode"] = json!(code);
        }
        let (status, json) = self
            .send(Method::POST, "/api/v1/auth/register", None, Some(body))
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {json}");
        let id: UserId = serde_json::from_value(json["user"]["id"].clone()).unwrap();
        (json["token"].as_str().unwrap().to_owned(), id)
    }

    async fn promote(&self, email: &str) {
        let email = Email::parse(email).unwrap();
        self.state
            .store()
            .users()
            .set_admin(&email, true)
            .await
            .unwrap()
            .unwrap();
    }
}

// =============================================================================
// Registration and login
// =============================================================================

#[tokio::test]
async fn test_register_returns_token_and_profile() {
    let app = TestApp::new();
    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "  Marie@Example.COM ",
                "password": PASSWORD,
                "name": "Marie",
                "firstName": "Marie",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].as_str().is_some_and(|t| t.contains('.')));
    assert_eq!(json["user"]["email"], "marie@example.com");
    assert_eq!(json["user"]["firstName"], "Marie");
    assert_eq!(json["user"]["isAdmin"], false);
    assert!(json["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let app = TestApp::new();
    app.register("marie@example.com", "Marie", None).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "MARIE@example.com", "password": PASSWORD, "name": "Other" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_weak_password_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "a@example.com", "password": "short1", "name": "A" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("marie@example.com", "Marie", None).await;

    let wrong_password = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "marie@example.com", "password": "wrongpass1" })),
        )
        .await;
    let unknown_email = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "wrongpass1" })),
        )
        .await;
    let malformed_email = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "wrongpass1" })),
        )
        .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password, malformed_email);
}

#[tokio::test]
async fn test_login_succeeds_with_normalized_email() {
    let app = TestApp::new();
    app.register("marie@example.com", "Marie", None).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": " MARIE@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["name"], "Marie");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Authenticated user routes
// =============================================================================

#[tokio::test]
async fn test_user_routes_require_token() {
    let app = TestApp::new();
    for uri in [
        "/api/v1/user/profile",
        "/api/v1/user/referral/code",
        "/api/v1/user/referral/stats",
    ] {
        let (status, json) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(json["error"], "Unauthorized");

        let (status, _) = app.send(Method::GET, uri, Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_profile_update_whitelist() {
    let app = TestApp::new();
    let (token, _) = app.register("marie@example.com", "Marie", None).await;

    let (status, json) = app
        .send(
            Method::PUT,
            "/api/v1/user/profile",
            Some(&token),
            Some(json!({ "firstName": "Marie", "lastName": "Curie" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lastName"], "Curie");

    // A forbidden key rejects the whole update.
    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/user/profile",
            Some(&token),
            Some(json!({ "name": "Hacker", "isAdmin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(Method::GET, "/api/v1/user/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Marie");
    assert_eq!(json["isAdmin"], false);
}

#[tokio::test]
async fn test_change_password_wrong_current_keeps_old_password() {
    let app = TestApp::new();
    let (token, _) = app.register("marie@example.com", "Marie", None).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&token),
            Some(json!({ "currentPassword": "notmypass1", "newPassword": "newgarden99" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token and password are both still valid.
    let (status, _) = app
        .send(Method::GET, "/api/v1/user/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "marie@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_revokes_old_tokens() {
    let app = TestApp::new();
    let (old_token, _) = app.register("marie@example.com", "Marie", None).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&old_token),
            Some(json!({ "currentPassword": PASSWORD, "newPassword": "newgarden99" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = json["token"].as_str().unwrap().to_owned();

    let (status, _) = app
        .send(Method::GET, "/api/v1/user/profile", Some(&old_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/v1/user/profile", Some(&new_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "marie@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_weak_new_password() {
    let app = TestApp::new();
    let (token, _) = app.register("marie@example.com", "Marie", None).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&token),
            Some(json!({ "currentPassword": PASSWORD, "newPassword": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::GET, "/api/v1/user/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Referrals
// =============================================================================

#[tokio::test]
async fn test_referral_flow() {
    let app = TestApp::new();
    let (marie_token, _) = app.register("marie@example.com", "Marie", None).await;

    let (status, share) = app
        .send(Method::GET, "/api/v1/user/referral/code", Some(&marie_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = share["code"].as_str().unwrap().to_owned();
    assert_eq!(
        share["shareUrl"],
        format!("https://garden.test/register?ref={code}")
    );

    // Same code on repeat calls.
    let (_, again) = app
        .send(Method::GET, "/api/v1/user/referral/code", Some(&marie_token), None)
        .await;
    assert_eq!(again["code"], code.as_str());

    let (_, luc_id) = app
        .register("luc@example.com", "Luc", Some(&code.to_lowercase()))
        .await;

    // Account and ledger entry are written together.
    let luc = app.state.store().users().get_by_id(luc_id).await.unwrap().unwrap();
    let entry = app
        .state
        .store()
        .referrals()
        .get_by_referee(luc_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(luc.referred_by, Some(entry.referrer_id));

    let (_, stats) = app
        .send(Method::GET, "/api/v1/user/referral/stats", Some(&marie_token), None)
        .await;
    assert_eq!(stats["totalReferrals"], 1);
    assert_eq!(stats["activeReferrals"], 0);
    assert_eq!(stats["premiumEarned"], 0);
    assert_eq!(stats["badge"], Value::Null);

    let outcome = app.state.ledger().activate(luc_id).await.unwrap();
    assert_eq!(outcome, ActivationOutcome::Activated);
    let outcome = app.state.ledger().activate(luc_id).await.unwrap();
    assert_eq!(outcome, ActivationOutcome::AlreadyActive);

    let (status, stats) = app
        .send(Method::GET, "/api/v1/user/referral/stats", Some(&marie_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalReferrals"], 1);
    assert_eq!(stats["activeReferrals"], 1);
    assert_eq!(stats["premiumEarned"], 30);
    assert_eq!(stats["badge"], "Seedling");
    assert_eq!(stats["nextReward"]["threshold"], 3);
    assert_eq!(stats["nextReward"]["badge"], "Sprout");
    assert_eq!(stats["nextReward"]["remaining"], 2);
}

#[tokio::test]
async fn test_unknown_referral_code_creates_nothing() {
    let app = TestApp::new();
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "luc@example.com",
                "password": PASSWORD,
                "name": "Luc",
                "referralCode": "ZZZZZZZZ",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let email = Email::parse("luc@example.com").unwrap();
    let user = app.state.store().users().get_by_email(&email).await.unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn test_stats_for_user_without_referrals() {
    let app = TestApp::new();
    let (token, _) = app.register("marie@example.com", "Marie", None).await;

    let (status, stats) = app
        .send(Method::GET, "/api/v1/user/referral/stats", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalReferrals"], 0);
    assert_eq!(stats["nextReward"]["threshold"], 1);
    assert_eq!(stats["nextReward"]["remaining"], 1);
}

// =============================================================================
// Admin
// =============================================================================

const ADMIN_LISTS: [&str; 5] = [
    "/api/v1/admin/season-tips",
    "/api/v1/admin/calendar-tasks",
    "/api/v1/admin/quiz/questions",
    "/api/v1/admin/blog/articles",
    "/api/v1/admin/analytics/overview",
];

const ADMIN_COLLECTIONS: [&str; 4] = [
    "/api/v1/admin/season-tips",
    "/api/v1/admin/calendar-tasks",
    "/api/v1/admin/quiz/questions",
    "/api/v1/admin/blog/articles",
];

#[tokio::test]
async fn test_admin_routes_gated() {
    let app = TestApp::new();
    let (user_token, _) = app.register("luc@example.com", "Luc", None).await;

    for uri in ADMIN_LISTS {
        let (status, _) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");

        let (status, json) = app.send(Method::GET, uri, Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(json["error"], "Forbidden");
    }

    for uri in ADMIN_COLLECTIONS {
        let body = json!({ "title": "Sow radishes" });

        let (status, _) = app
            .send(Method::POST, uri, None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");

        let (status, _) = app
            .send(Method::POST, uri, Some(&user_token), Some(body))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/admin/messages/broadcast",
            Some(&user_token),
            Some(json!({ "title": "hi" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_content_and_analytics() {
    let app = TestApp::new();
    let (token, _) = app.register("admin@example.com", "Admin", None).await;
    app.promote("admin@example.com").await;

    for uri in ADMIN_LISTS {
        let (status, _) = app.send(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }

    let (status, item) = app
        .send(
            Method::POST,
            "/api/v1/admin/season-tips",
            Some(&token),
            Some(json!({ "title": "Mulch in autumn", "season": "autumn" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["body"]["title"], "Mulch in autumn");

    let (_, list) = app
        .send(Method::GET, "/api/v1/admin/season-tips", Some(&token), None)
        .await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/admin/messages/broadcast",
            Some(&token),
            Some(json!({ "title": "Frost warning" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Non-object bodies are rejected.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/admin/calendar-tasks",
            Some(&token),
            Some(json!(["not", "an", "object"])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for uri in ["/api/v1/admin/calendar-tasks", "/api/v1/admin/blog/articles"] {
        let (status, item) = app
            .send(
                Method::POST,
                uri,
                Some(&token),
                Some(json!({ "title": "Sow radishes", "month": 3 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(item["body"]["month"], 3, "{uri}");

        let (_, list) = app.send(Method::GET, uri, Some(&token), None).await;
        assert_eq!(list["items"].as_array().unwrap().len(), 1, "{uri}");
    }

    let (status, overview) = app
        .send(Method::GET, "/api/v1/admin/analytics/overview", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["totalUsers"], 1);
    assert_eq!(overview["content"]["season_tip"], 1);
    assert_eq!(overview["content"]["broadcast"], 1);
    assert_eq!(overview["content"]["calendar_task"], 1);
    assert_eq!(overview["content"]["blog_article"], 1);
    assert_eq!(overview["content"]["quiz_question"], 0);
}

#[tokio::test]
async fn test_demoted_admin_loses_access() {
    let app = TestApp::new();
    let (token, _) = app.register("admin@example.com", "Admin", None).await;
    app.promote("admin@example.com").await;

    let email = Email::parse("admin@example.com").unwrap();
    app.state
        .store()
        .users()
        .set_admin(&email, false)
        .await
        .unwrap();

    let (status, _) = app
        .send(Method::GET, "/api/v1/admin/season-tips", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Health and headers
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();
    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = TestApp::new();

    let response = app
        .raw(Method::GET, "/api/v1/user/profile", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
}
