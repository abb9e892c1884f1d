//! Referral ledger domain types.

use chrono::{DateTime, Utc};

use garden_core::{ReferralId, ReferralStatus, UserId};

/// One referral relationship between a referrer and the user they brought in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralEntry {
    pub id: ReferralId,
    pub referrer_id: UserId,
    /// Unique across the ledger: a user is referred at most once.
    pub referee_id: UserId,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the entry transitions to `Active`.
    pub activated_at: Option<DateTime<Utc>>,
}
