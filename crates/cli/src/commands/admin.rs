//! Admin flag management.
//!
//! The API never exposes a way to grant admin access; it is set here,
//! out of band, by someone with database credentials.
//!
//! # Usage
//!
//! ```bash
//! garden-cli admin promote -e gardener@example.com
//! garden-cli admin demote -e gardener@example.com
//! ```

use garden_api::db::{RepositoryError, Store};
use garden_core::{Email, EmailError};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No user registered with email: {0}")]
    UserNotFound(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Grant or revoke admin access for the user with `email`.
///
/// Existing tokens pick up the change on their next request.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), AdminError> {
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let store = Store::postgres(pool);

    let user = store
        .users()
        .set_admin(&email, is_admin)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        is_admin = user.is_admin,
        "Admin flag updated"
    );

    store.close().await;
    Ok(())
}
