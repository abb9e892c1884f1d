//! Self-service profile and password handlers.

use axum::extract::State;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::instrument;

use super::AppJson;
use super::auth::AuthResponse;
use crate::error::Result;
use crate::middleware::Identity;
use crate::models::user::ProfileView;
use crate::services::auth::parse_profile_update;
use crate::state::AppState;

/// Password change request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/v1/user/profile
///
/// # Errors
///
/// `401` if the user no longer exists.
#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<AppJson<ProfileView>> {
    let user = state.credentials().get_user(user.id).await?;
    Ok(AppJson(ProfileView::from(&user)))
}

/// PUT /api/v1/user/profile
///
/// Accepts `name`, `firstName` and `lastName`. Any other key rejects the
/// whole request before anything is written.
///
/// # Errors
///
/// `400` for a forbidden key or invalid value.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    Identity(user): Identity,
    AppJson(fields): AppJson<Map<String, Value>>,
) -> Result<AppJson<ProfileView>> {
    let update = parse_profile_update(&fields)?;
    let user = state.credentials().update_profile(user.id, &update).await?;

    tracing::info!("Profile updated");
    Ok(AppJson(ProfileView::from(&user)))
}

/// POST /api/v1/user/change-password
///
/// Tokens issued before the change stop working; the response carries a
/// fresh one.
///
/// # Errors
///
/// `401` if the current password is wrong, `400` if the new one is weak.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    Identity(user): Identity,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> Result<AppJson<AuthResponse>> {
    let user = state
        .credentials()
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    Ok(AppJson(AuthResponse::issue(&state, &user)?))
}
