//! Access-control gate and identity extractor.
//!
//! Each router group declares the [`Capability`] it needs with
//! [`RequireCapability::require`]; one middleware layer then enforces it for
//! every route in the group:
//!
//! 1. Read `Authorization: Bearer <token>`
//! 2. Verify the token signature and expiry
//! 3. Load the user and compare the token version
//! 4. For [`Capability::Admin`], check the admin flag
//!
//! On success the resolved [`CurrentUser`] is placed in request extensions and
//! handlers read it with the [`Identity`] extractor. Handlers never check
//! roles themselves.

use axum::{
    Router,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// What a caller must prove to reach a route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Any valid, current bearer token.
    Authenticated,
    /// A valid token belonging to an admin.
    Admin,
}

/// Attach an access-control gate to a router group.
pub trait RequireCapability {
    /// Require `capability` for every route added to this router so far.
    #[must_use]
    fn require(self, capability: Capability, state: &AppState) -> Self;
}

impl RequireCapability for Router<AppState> {
    fn require(self, capability: Capability, state: &AppState) -> Self {
        match capability {
            Capability::Authenticated => {
                self.route_layer(from_fn_with_state(state.clone(), require_authenticated))
            }
            Capability::Admin => self.route_layer(from_fn_with_state(state.clone(), require_admin)),
        }
    }
}

/// Gate for [`Capability::Authenticated`] routes.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the caller has no valid, current token.
pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state, Capability::Authenticated, request, next).await
}

/// Gate for [`Capability::Admin`] routes.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the caller has no valid, current token
/// and `AppError::Forbidden` if the caller is not an admin.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate(&state, Capability::Admin, request, next).await
}

async fn gate(
    state: &AppState,
    capability: Capability,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = authorize(state, capability, request.headers()).await?;

    Span::current().record("user_id", tracing::field::display(current.id));
    set_sentry_user(&current.id, Some(current.email.as_str()));

    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

async fn authorize(
    state: &AppState,
    capability: Capability,
    headers: &HeaderMap,
) -> Result<CurrentUser, AppError> {
    let Some(token) = bearer_token(headers) else {
        tracing::debug!("Missing or malformed bearer token");
        return Err(AppError::Unauthorized("missing bearer token".to_string()));
    };

    let claims = state.tokens().verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Token rejected");
        AppError::from(e)
    })?;

    let Some(user) = state.store().users().get_by_id(claims.sub).await? else {
        tracing::warn!(user_id = %claims.sub, "Token subject no longer exists");
        return Err(AppError::Unauthorized("unknown subject".to_string()));
    };

    if claims.ver != user.token_version {
        tracing::debug!(
            user_id = %user.id,
            token_version = claims.ver,
            current_version = user.token_version,
            "Token revoked by credential change"
        );
        return Err(AppError::Unauthorized("token version mismatch".to_string()));
    }

    if capability == Capability::Admin && !user.is_admin {
        tracing::warn!(user_id = %user.id, "Non-admin denied admin route");
        return Err(AppError::Forbidden("admin required".to_string()));
    }

    Ok(CurrentUser::from(&user))
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The identity resolved by the gate for this request.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Identity(user): Identity) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
///
/// Rejects with `Unauthorized` if the route is not behind a gate.
#[derive(Debug, Clone)]
pub struct Identity(pub CurrentUser);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                tracing::error!(path = %parts.uri.path(), "Identity requested on an ungated route");
                AppError::Unauthorized("no identity".to_string())
            })
    }
}
