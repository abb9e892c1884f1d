//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// State of a referral relationship.
///
/// A referral starts `Pending` when the referee registers with a code and
/// becomes `Active` once an external activation signal arrives. `Active` is
/// terminal; there is no transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "garden.referral_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    #[default]
    Pending,
    Active,
}

impl ReferralStatus {
    /// Whether this referral counts toward rewards.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
        }
    }
}

impl std::str::FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            _ => Err(format!("invalid referral status: {s}")),
        }
    }
}

/// Kind of admin-managed content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "garden.content_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Seasonal gardening tip.
    SeasonTip,
    /// Entry in the planting calendar.
    CalendarTask,
    /// Quiz question.
    QuizQuestion,
    /// Message broadcast to all users.
    Broadcast,
    /// Blog article.
    BlogArticle,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeasonTip => write!(f, "season_tip"),
            Self::CalendarTask => write!(f, "calendar_task"),
            Self::QuizQuestion => write!(f, "quiz_question"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::BlogArticle => write!(f, "blog_article"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_referral_status_default_is_pending() {
        assert_eq!(ReferralStatus::default(), ReferralStatus::Pending);
        assert!(!ReferralStatus::Pending.is_active());
        assert!(ReferralStatus::Active.is_active());
    }

    #[test]
    fn test_referral_status_parse_display() {
        for status in [ReferralStatus::Pending, ReferralStatus::Active] {
            assert_eq!(status.to_string().parse::<ReferralStatus>().unwrap(), status);
        }
        assert!("revoked".parse::<ReferralStatus>().is_err());
    }

    #[test]
    fn test_content_kind_serde_matches_display() {
        let json = serde_json::to_string(&ContentKind::QuizQuestion).unwrap();
        assert_eq!(json, format!("\"{}\"", ContentKind::QuizQuestion));
    }
}
