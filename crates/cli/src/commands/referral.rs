//! Referral activation.
//!
//! Activation is driven by signals outside the API (for example a confirmed
//! subscription). This command applies one by hand.
//!
//! # Usage
//!
//! ```bash
//! garden-cli referral activate -e luc@example.com
//! ```

use garden_api::db::{RepositoryError, Store};
use garden_api::services::referral::{ActivationOutcome, ReferralError, ReferralLedger};
use garden_core::{Email, EmailError};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during referral operations.
#[derive(Debug, Error)]
pub enum ReferralCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No user registered with email: {0}")]
    UserNotFound(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Referral(#[from] ReferralError),
}

/// Activate the referral recorded for the referee with `email`.
pub async fn activate(email: &str) -> Result<(), ReferralCommandError> {
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let store = Store::postgres(pool);

    let referee = store
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| ReferralCommandError::UserNotFound(email.to_string()))?;

    let outcome = ReferralLedger::new(store.users(), store.referrals())
        .activate(referee.id)
        .await?;

    match outcome {
        ActivationOutcome::Activated => {
            tracing::info!(referee_id = %referee.id, "Referral activated");
        }
        ActivationOutcome::AlreadyActive => {
            tracing::warn!(referee_id = %referee.id, "Referral was already active");
        }
    }

    store.close().await;
    Ok(())
}
