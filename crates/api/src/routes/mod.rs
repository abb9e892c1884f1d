//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                            - Liveness
//! GET  /health/ready                      - Readiness (store reachable)
//!
//! # Auth (public)
//! POST /api/v1/auth/register              - Create account, returns token
//! POST /api/v1/auth/login                 - Password login, returns token
//!
//! # User (bearer token)
//! GET  /api/v1/user/profile               - Own profile
//! PUT  /api/v1/user/profile               - Update name fields
//! POST /api/v1/user/change-password       - Change password, returns new token
//! GET  /api/v1/user/referral/code         - Own referral code and share links
//! GET  /api/v1/user/referral/stats        - Referral counts, premium days, badge
//!
//! # Admin (bearer token, admin flag)
//! GET|POST /api/v1/admin/season-tips
//! GET|POST /api/v1/admin/calendar-tasks
//! GET|POST /api/v1/admin/quiz/questions
//! GET      /api/v1/admin/analytics/overview
//! POST     /api/v1/admin/messages/broadcast
//! GET|POST /api/v1/admin/blog/articles
//! ```

pub mod admin;
pub mod auth;
pub mod referral;
pub mod user;

use axum::{
    Router,
    extract::FromRequest,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::{Capability, RequireCapability};
use crate::state::AppState;

/// JSON extractor and response whose rejections are [`AppError`]s.
///
/// Malformed bodies become `400` with the standard error body instead of
/// axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// All versioned API routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/api/v1",
        Router::new()
            .nest("/auth", auth_routes())
            .nest("/user", user_routes(state))
            .nest("/admin", admin_routes(state)),
    )
}

/// Public registration and login.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
}

/// Self-service routes for any authenticated user.
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/profile", get(user::get_profile).put(user::update_profile))
        .route("/change-password", post(user::change_password))
        .route("/referral/code", get(referral::code))
        .route("/referral/stats", get(referral::stats))
        .require(Capability::Authenticated, state)
}

/// Content and analytics management, admins only.
fn admin_routes(state: &AppState) -> Router<AppState> {
    use garden_core::ContentKind;

    Router::new()
        .route("/season-tips", admin::collection(ContentKind::SeasonTip))
        .route("/calendar-tasks", admin::collection(ContentKind::CalendarTask))
        .route("/quiz/questions", admin::collection(ContentKind::QuizQuestion))
        .route("/analytics/overview", get(admin::analytics_overview))
        .route("/messages/broadcast", post(admin::broadcast))
        .route("/blog/articles", admin::collection(ContentKind::BlogArticle))
        .require(Capability::Admin, state)
}
