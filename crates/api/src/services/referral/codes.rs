//! Referral code assignment.

use serde::Serialize;

use garden_core::{ReferralCode, UserId};

use super::ReferralError;
use crate::db::{RepositoryError, UserRepository};

/// Maximum number of candidate codes tried before giving up.
pub const MAX_ASSIGNMENT_ATTEMPTS: usize = 5;

/// A user's code with the links a client needs to share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralShare {
    pub code: ReferralCode,
    pub share_url: String,
    pub share_message: String,
}

impl ReferralShare {
    /// Build the share links for a code.
    #[must_use]
    pub fn new(code: ReferralCode, public_url: &str) -> Self {
        let share_url = format!("{}/register?ref={code}", public_url.trim_end_matches('/'));
        let share_message = format!(
            "Grow with me on Garden Companion! Sign up with my code {code} and we both earn \
             premium days: {share_url}"
        );
        Self {
            code,
            share_url,
            share_message,
        }
    }
}

/// Assigns referral codes, at most one per user.
pub struct ReferralCodeGenerator<'a> {
    users: &'a dyn UserRepository,
    public_url: &'a str,
}

impl<'a> ReferralCodeGenerator<'a> {
    /// Create a new generator.
    #[must_use]
    pub const fn new(users: &'a dyn UserRepository, public_url: &'a str) -> Self {
        Self { users, public_url }
    }

    /// Return the user's code, assigning a fresh one if they have none.
    ///
    /// Idempotent: once a code is assigned it is returned unchanged. If a
    /// concurrent call assigns first, that call's code is returned.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::UserNotFound` if the user does not exist.
    /// Returns `ReferralError::CodeAssignmentExhausted` if every candidate
    /// collided with an existing code.
    pub async fn get_or_create_code(&self, user_id: UserId) -> Result<ReferralShare, ReferralError> {
        let code = self.get_or_assign(user_id).await?;
        Ok(ReferralShare::new(code, self.public_url))
    }

    async fn get_or_assign(&self, user_id: UserId) -> Result<ReferralCode, ReferralError> {
        if let Some(code) = self.current_code(user_id).await? {
            return Ok(code);
        }

        for attempt in 1..=MAX_ASSIGNMENT_ATTEMPTS {
            let candidate = ReferralCode::generate();

            match self.users.assign_referral_code(user_id, &candidate).await {
                Ok(true) => {
                    tracing::info!(user_id = %user_id, code = %candidate, "Referral code assigned");
                    return Ok(candidate);
                }
                // Lost the race: someone else assigned this user's code.
                Ok(false) => {
                    return self
                        .current_code(user_id)
                        .await?
                        .ok_or(ReferralError::UserNotFound);
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::debug!(attempt, "Referral code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(user_id = %user_id, "Referral code assignment exhausted");
        Err(ReferralError::CodeAssignmentExhausted(MAX_ASSIGNMENT_ATTEMPTS))
    }

    async fn current_code(&self, user_id: UserId) -> Result<Option<ReferralCode>, ReferralError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(ReferralError::UserNotFound)?;
        Ok(user.referral_code)
    }
}
