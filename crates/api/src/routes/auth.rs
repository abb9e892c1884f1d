//! Registration and login handlers.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::AppJson;
use crate::error::Result;
use crate::models::User;
use crate::models::user::ProfileView;
use crate::services::auth::Registration;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub referral_code: Option<String>,
}

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token plus the identity it was issued for.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: ProfileView,
}

impl AuthResponse {
    /// Issue a fresh token for `user`.
    pub(crate) fn issue(state: &AppState, user: &User) -> Result<Self> {
        let issued = state.tokens().issue(user)?;
        Ok(Self {
            token: issued.token,
            expires_at: issued.expires_at,
            user: ProfileView::from(user),
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/v1/auth/register
///
/// A referral code, if given, is resolved before the account is created so an
/// unknown code creates nothing.
///
/// # Errors
///
/// `400` for invalid input or an unknown referral code, `409` if the email is
/// already registered.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<AppJson<AuthResponse>> {
    let referrer = match body
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
    {
        Some(code) => Some(state.ledger().resolve_code(code).await?),
        None => None,
    };

    let user = state
        .credentials()
        .register(Registration {
            email: body.email,
            password: body.password,
            name: body.name,
            first_name: body.first_name,
            last_name: body.last_name,
            referrer,
        })
        .await?;

    Ok(AppJson(AuthResponse::issue(&state, &user)?))
}

/// POST /api/v1/auth/login
///
/// # Errors
///
/// `401` with the same body whether the email is unknown or the password wrong.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<AppJson<AuthResponse>> {
    let user = state
        .credentials()
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::debug!(error = %e, "Login failed"))?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(AppJson(AuthResponse::issue(&state, &user)?))
}
