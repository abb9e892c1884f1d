//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error response is JSON: `{ "error": "<client-safe message>" }`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::{AuthError, TokenError};
use crate::services::referral::ReferralError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Referral operation failed.
    #[error("Referral error: {0}")]
    Referral(#[from] ReferralError),

    /// Request body failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated. The reason is logged, never returned.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but lacks the required capability.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Invalid => Self::Unauthorized(err.to_string()),
            TokenError::Encode(e) => Self::Internal(format!("token encoding failed: {e}")),
            TokenError::Lifetime => Self::Internal(err.to_string()),
        }
    }
}

impl AppError {
    /// Whether this error is the server's fault.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Auth(
                    AuthError::PasswordHash
                        | AuthError::WorkerPoolClosed
                        | AuthError::Repository(_)
                )
                | Self::Referral(
                    ReferralError::CodeAssignmentExhausted(_) | ReferralError::Repository(_)
                )
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_)
                | AuthError::InvalidProfileUpdate(_) => StatusCode::BAD_REQUEST,
                AuthError::PasswordHash
                | AuthError::WorkerPoolClosed
                | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Referral(err) => match err {
                ReferralError::UnknownReferralCode => StatusCode::BAD_REQUEST,
                ReferralError::NotFound => StatusCode::NOT_FOUND,
                ReferralError::UserNotFound => StatusCode::UNAUTHORIZED,
                ReferralError::CodeAssignmentExhausted(_) | ReferralError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to show to clients.
    fn client_message(&self) -> String {
        if self.is_server_error() {
            return "Internal server error".to_string();
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_string()
                }
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::WeakPassword(msg)
                | AuthError::InvalidName(msg)
                | AuthError::InvalidProfileUpdate(msg) => msg.clone(),
                _ => "Authentication error".to_string(),
            },
            Self::Referral(err) => match err {
                ReferralError::UnknownReferralCode => "Unknown referral code".to_string(),
                ReferralError::NotFound => "Referral not found".to_string(),
                ReferralError::UserNotFound => "Unauthorized".to_string(),
                _ => "Referral error".to_string(),
            },
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::Forbidden(_) => "Forbidden".to_string(),
            Self::Validation(msg) | Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let body = Json(json!({ "error": self.client_message() }));

        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the access-control gate so errors are associated with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
