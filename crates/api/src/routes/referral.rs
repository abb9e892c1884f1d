//! Referral code and stats handlers.

use axum::extract::State;
use tracing::instrument;

use super::AppJson;
use crate::error::Result;
use crate::middleware::Identity;
use crate::services::referral::{ReferralShare, ReferralStats};
use crate::state::AppState;

/// GET /api/v1/user/referral/code
///
/// Assigns a code on first call; later calls return the same code.
///
/// # Errors
///
/// `500` if no unique code could be assigned.
#[instrument(skip_all)]
pub async fn code(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<AppJson<ReferralShare>> {
    let share = state.referral_codes().get_or_create_code(user.id).await?;
    Ok(AppJson(share))
}

/// GET /api/v1/user/referral/stats
///
/// # Errors
///
/// `500` if the ledger cannot be read.
#[instrument(skip_all)]
pub async fn stats(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<AppJson<ReferralStats>> {
    let entries = state.ledger().entries_for_referrer(user.id).await?;
    Ok(AppJson(state.rewards().calculate(&entries)))
}
