//! Referral program services.
//!
//! - [`ReferralCodeGenerator`] assigns each user one shareable code.
//! - [`ReferralLedger`] records referrals and their activation.
//! - [`RewardPolicy::calculate`] turns ledger entries into reward stats.

mod codes;
mod error;
mod ledger;
mod rewards;

pub use codes::{MAX_ASSIGNMENT_ATTEMPTS, ReferralCodeGenerator, ReferralShare};
pub use error::ReferralError;
pub use ledger::{ActivationOutcome, RecordOutcome, ReferralLedger};
pub use rewards::{
    DEFAULT_REWARD_DAYS_PER_REFERRAL, DEFAULT_REWARD_TIERS, NextReward, ReferralStats,
    RewardPolicy, RewardTable, RewardTableError, RewardTier,
};
