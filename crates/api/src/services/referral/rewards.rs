//! Reward tier calculation.
//!
//! Turns a referrer's ledger entries into the stats shown on the referral
//! screen. Thresholds and badge names come from configuration; nothing here
//! knows their values.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::models::ReferralEntry;

/// Default reward tiers, as accepted by [`RewardTable::from_str`].
pub const DEFAULT_REWARD_TIERS: &str = "1:Seedling,3:Sprout,5:Green Thumb,10:Master Gardener";

/// Default premium days credited per active referral.
pub const DEFAULT_REWARD_DAYS_PER_REFERRAL: u32 = 30;

/// Errors from building a reward table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewardTableError {
    #[error("reward table must have at least one tier")]
    Empty,
    #[error("malformed tier '{0}', expected THRESHOLD:BADGE")]
    Malformed(String),
    #[error("tier thresholds must be greater than zero")]
    ZeroThreshold,
    #[error("tier thresholds must be strictly ascending ({previous} then {next})")]
    NotAscending { previous: u32, next: u32 },
    #[error("badge name for threshold {0} is empty")]
    EmptyBadge(u32),
}

/// One reward tier: a badge unlocked at a number of active referrals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardTier {
    pub threshold: u32,
    pub badge: String,
}

/// Validated, strictly ascending list of reward tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardTable {
    tiers: Vec<RewardTier>,
}

impl RewardTable {
    /// Build a table from tiers.
    ///
    /// # Errors
    ///
    /// Returns `RewardTableError` if the list is empty, a threshold is zero,
    /// a badge is blank, or thresholds are not strictly ascending.
    pub fn new(tiers: Vec<RewardTier>) -> Result<Self, RewardTableError> {
        if tiers.is_empty() {
            return Err(RewardTableError::Empty);
        }

        for tier in &tiers {
            if tier.threshold == 0 {
                return Err(RewardTableError::ZeroThreshold);
            }
            if tier.badge.trim().is_empty() {
                return Err(RewardTableError::EmptyBadge(tier.threshold));
            }
        }

        for pair in tiers.windows(2) {
            if let [previous, next] = pair
                && next.threshold <= previous.threshold
            {
                return Err(RewardTableError::NotAscending {
                    previous: previous.threshold,
                    next: next.threshold,
                });
            }
        }

        Ok(Self { tiers })
    }

    /// The tiers in ascending threshold order.
    #[must_use]
    pub fn tiers(&self) -> &[RewardTier] {
        &self.tiers
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                RewardTier { threshold: 1, badge: "Seedling".to_owned() },
                RewardTier { threshold: 3, badge: "Sprout".to_owned() },
                RewardTier { threshold: 5, badge: "Green Thumb".to_owned() },
                RewardTier { threshold: 10, badge: "Master Gardener".to_owned() },
            ],
        }
    }
}

/// Parses `THRESHOLD:BADGE` pairs separated by commas.
impl FromStr for RewardTable {
    type Err = RewardTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tiers = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (threshold, badge) = part
                    .split_once(':')
                    .ok_or_else(|| RewardTableError::Malformed(part.to_owned()))?;
                let threshold = threshold
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| RewardTableError::Malformed(part.to_owned()))?;
                Ok(RewardTier {
                    threshold,
                    badge: badge.trim().to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(tiers)
    }
}

impl fmt::Display for RewardTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tier) in self.tiers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", tier.threshold, tier.badge)?;
        }
        Ok(())
    }
}

/// Reward configuration: days per active referral plus the tier table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardPolicy {
    pub days_per_referral: u32,
    pub tiers: RewardTable,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            days_per_referral: DEFAULT_REWARD_DAYS_PER_REFERRAL,
            tiers: RewardTable::default(),
        }
    }
}

/// The next tier a referrer has not reached yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextReward {
    pub threshold: u32,
    pub badge: String,
    /// Active referrals still needed.
    pub remaining: u32,
}

/// Aggregate referral stats for one referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub total_referrals: u32,
    pub active_referrals: u32,
    /// Premium days earned.
    pub premium_earned: u32,
    pub badge: Option<String>,
    pub next_reward: Option<NextReward>,
}

impl RewardPolicy {
    /// Compute stats from a referrer's ledger entries.
    #[must_use]
    pub fn calculate(&self, entries: &[ReferralEntry]) -> ReferralStats {
        let total = saturating_u32(entries.len());
        let active = saturating_u32(entries.iter().filter(|e| e.status.is_active()).count());

        let badge = self
            .tiers
            .tiers()
            .iter()
            .rev()
            .find(|tier| active >= tier.threshold)
            .map(|tier| tier.badge.clone());

        let next_reward = self
            .tiers
            .tiers()
            .iter()
            .find(|tier| active < tier.threshold)
            .map(|tier| NextReward {
                threshold: tier.threshold,
                badge: tier.badge.clone(),
                remaining: tier.threshold - active,
            });

        ReferralStats {
            total_referrals: total,
            active_referrals: active,
            premium_earned: active.saturating_mul(self.days_per_referral),
            badge,
            next_reward,
        }
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use garden_core::{ReferralId, ReferralStatus, UserId};

    fn entries(pending: usize, active: usize) -> Vec<ReferralEntry> {
        let referrer = UserId::generate();
        let make = |status: ReferralStatus| ReferralEntry {
            id: ReferralId::generate(),
            referrer_id: referrer,
            referee_id: UserId::generate(),
            status,
            created_at: Utc::now(),
            activated_at: status.is_active().then(Utc::now),
        };
        std::iter::repeat_n(ReferralStatus::Pending, pending)
            .chain(std::iter::repeat_n(ReferralStatus::Active, active))
            .map(make)
            .collect()
    }

    #[test]
    fn test_parse_default_tiers() {
        let table: RewardTable = DEFAULT_REWARD_TIERS.parse().unwrap();
        assert_eq!(table, RewardTable::default());
        assert_eq!(table.to_string(), DEFAULT_REWARD_TIERS);
    }

    #[test]
    fn test_parse_rejects_bad_tables() {
        assert_eq!("".parse::<RewardTable>(), Err(RewardTableError::Empty));
        assert_eq!(
            "0:Nothing".parse::<RewardTable>(),
            Err(RewardTableError::ZeroThreshold)
        );
        assert_eq!(
            "3:B,1:A".parse::<RewardTable>(),
            Err(RewardTableError::NotAscending { previous: 3, next: 1 })
        );
        assert_eq!(
            "2:A,2:B".parse::<RewardTable>(),
            Err(RewardTableError::NotAscending { previous: 2, next: 2 })
        );
        assert!(matches!(
            "Seedling".parse::<RewardTable>(),
            Err(RewardTableError::Malformed(_))
        ));
        assert_eq!(
            "1:  ".parse::<RewardTable>(),
            Err(RewardTableError::EmptyBadge(1))
        );
    }

    #[test]
    fn test_no_referrals() {
        let stats = RewardPolicy::default().calculate(&[]);
        assert_eq!(stats.total_referrals, 0);
        assert_eq!(stats.active_referrals, 0);
        assert_eq!(stats.premium_earned, 0);
        assert_eq!(stats.badge, None);
        assert_eq!(
            stats.next_reward,
            Some(NextReward {
                threshold: 1,
                badge: "Seedling".to_owned(),
                remaining: 1,
            })
        );
    }

    #[test]
    fn test_pending_referrals_do_not_count() {
        let stats = RewardPolicy::default().calculate(&entries(1, 0));
        assert_eq!(stats.total_referrals, 1);
        assert_eq!(stats.active_referrals, 0);
        assert_eq!(stats.premium_earned, 0);
    }

    #[test]
    fn test_activation_adds_reward_days() {
        let policy = RewardPolicy::default();
        let before = policy.calculate(&entries(1, 0));
        let after = policy.calculate(&entries(0, 1));
        assert_eq!(
            after.premium_earned - before.premium_earned,
            policy.days_per_referral
        );
        assert_eq!(after.badge.as_deref(), Some("Seedling"));
    }

    #[test]
    fn test_badge_is_highest_met_threshold() {
        let stats = RewardPolicy::default().calculate(&entries(2, 4));
        assert_eq!(stats.badge.as_deref(), Some("Sprout"));
        let next = stats.next_reward.unwrap();
        assert_eq!(next.threshold, 5);
        assert_eq!(next.remaining, 1);
    }

    #[test]
    fn test_all_tiers_met() {
        let stats = RewardPolicy::default().calculate(&entries(0, 12));
        assert_eq!(stats.badge.as_deref(), Some("Master Gardener"));
        assert_eq!(stats.next_reward, None);
        assert_eq!(stats.premium_earned, 12 * DEFAULT_REWARD_DAYS_PER_REFERRAL);
    }

    #[test]
    fn test_custom_table() {
        let policy = RewardPolicy {
            days_per_referral: 7,
            tiers: "2:Bud,4:Bloom".parse().unwrap(),
        };
        let stats = policy.calculate(&entries(0, 2));
        assert_eq!(stats.premium_earned, 14);
        assert_eq!(stats.badge.as_deref(), Some("Bud"));
        assert_eq!(stats.next_reward.unwrap().badge, "Bloom");
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = RewardPolicy::default().calculate(&entries(0, 1));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalReferrals"], 1);
        assert_eq!(json["activeReferrals"], 1);
        assert_eq!(json["premiumEarned"], 30);
        assert_eq!(json["badge"], "Seedling");
        assert_eq!(json["nextReward"]["remaining"], 2);
    }
}
