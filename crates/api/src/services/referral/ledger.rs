//! Referral ledger.
//!
//! Records who referred whom and moves entries from pending to active when
//! the external activation signal arrives.

use chrono::Utc;

use garden_core::{ReferralCode, UserId};

use super::ReferralError;
use crate::db::{ReferralRepository, RepositoryError, UserRepository};
use crate::models::ReferralEntry;

/// Result of [`ReferralLedger::record_referral`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new pending entry was created.
    Recorded(ReferralEntry),
    /// The code belongs to the referee.
    SelfReferral,
    /// The referee already has an entry.
    AlreadyReferred,
}

/// Result of [`ReferralLedger::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    AlreadyActive,
}

/// Referral ledger service.
pub struct ReferralLedger<'a> {
    users: &'a dyn UserRepository,
    referrals: &'a dyn ReferralRepository,
}

impl<'a> ReferralLedger<'a> {
    /// Create a new ledger service.
    #[must_use]
    pub const fn new(users: &'a dyn UserRepository, referrals: &'a dyn ReferralRepository) -> Self {
        Self { users, referrals }
    }

    /// Resolve a referral code to its owner.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::UnknownReferralCode` if the code is malformed
    /// or no user owns it.
    pub async fn resolve_code(&self, code: &str) -> Result<UserId, ReferralError> {
        let code = ReferralCode::parse(code).map_err(|_| ReferralError::UnknownReferralCode)?;

        self.users
            .get_by_referral_code(&code)
            .await?
            .map(|user| user.id)
            .ok_or(ReferralError::UnknownReferralCode)
    }

    /// Attribute a referee to the owner of `code`.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::UnknownReferralCode` if no user owns the code.
    pub async fn record_referral(
        &self,
        referee_id: UserId,
        code: &str,
    ) -> Result<RecordOutcome, ReferralError> {
        let referrer_id = self.resolve_code(code).await?;
        self.record_for_referrer(referee_id, referrer_id).await
    }

    /// Attribute a referee to an already resolved referrer.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::Repository` if the store fails.
    pub async fn record_for_referrer(
        &self,
        referee_id: UserId,
        referrer_id: UserId,
    ) -> Result<RecordOutcome, ReferralError> {
        if referrer_id == referee_id {
            tracing::debug!(user_id = %referee_id, "Ignoring self-referral");
            return Ok(RecordOutcome::SelfReferral);
        }

        let entry = match self.referrals.create(referrer_id, referee_id).await {
            Ok(entry) => entry,
            Err(RepositoryError::Conflict(_)) => {
                tracing::debug!(referee_id = %referee_id, "Referee already attributed");
                return Ok(RecordOutcome::AlreadyReferred);
            }
            Err(e) => return Err(e.into()),
        };

        self.users.set_referred_by(referee_id, referrer_id).await?;

        tracing::info!(
            referrer_id = %referrer_id,
            referee_id = %referee_id,
            "Referral recorded"
        );
        Ok(RecordOutcome::Recorded(entry))
    }

    /// Mark the referee's entry active.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::NotFound` if the referee has no entry.
    pub async fn activate(&self, referee_id: UserId) -> Result<ActivationOutcome, ReferralError> {
        if self.referrals.activate(referee_id, Utc::now()).await? {
            tracing::info!(referee_id = %referee_id, "Referral activated");
            return Ok(ActivationOutcome::Activated);
        }

        match self.referrals.get_by_referee(referee_id).await? {
            Some(_) => Ok(ActivationOutcome::AlreadyActive),
            None => Err(ReferralError::NotFound),
        }
    }

    /// All entries credited to a referrer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::Repository` if the store fails.
    pub async fn entries_for_referrer(
        &self,
        referrer_id: UserId,
    ) -> Result<Vec<ReferralEntry>, ReferralError> {
        Ok(self.referrals.list_by_referrer(referrer_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewUser;
    use garden_core::{Email, ReferralStatus};

    async fn user_with_code(store: &MemoryStore, email: &str, code: Option<&str>) -> UserId {
        let user = UserRepository::create(
            store,
            NewUser {
                email: Email::parse(email).unwrap(),
                password_hash: "hash".to_owned(),
                name: "Test".to_owned(),
                first_name: None,
                last_name: None,
                referred_by: None,
            },
        )
        .await
        .unwrap();
        if let Some(code) = code {
            store
                .assign_referral_code(user.id, &ReferralCode::parse(code).unwrap())
                .await
                .unwrap();
        }
        user.id
    }

    #[tokio::test]
    async fn test_record_and_activate() {
        let store = MemoryStore::new();
        let marie = user_with_code(&store, "marie@example.com", Some("MARYE234")).await;
        let luc = user_with_code(&store, "luc@example.com", None).await;
        let ledger = ReferralLedger::new(&store, &store);

        let outcome = ledger.record_referral(luc, "marye234").await.unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded(_)));

        let luc_user = store.get_by_id(luc).await.unwrap().unwrap();
        assert_eq!(luc_user.referred_by, Some(marie));

        let entries = ledger.entries_for_referrer(marie).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, ReferralStatus::Pending);

        assert_eq!(ledger.activate(luc).await.unwrap(), ActivationOutcome::Activated);
        assert_eq!(
            ledger.activate(luc).await.unwrap(),
            ActivationOutcome::AlreadyActive
        );

        let entries = ledger.entries_for_referrer(marie).await.unwrap();
        assert_eq!(entries[0].status, ReferralStatus::Active);
        assert!(entries[0].activated_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let store = MemoryStore::new();
        let luc = user_with_code(&store, "luc@example.com", None).await;
        let ledger = ReferralLedger::new(&store, &store);

        let err = ledger.record_referral(luc, "ZZZZ2222").await.unwrap_err();
        assert!(matches!(err, ReferralError::UnknownReferralCode));

        let err = ledger.record_referral(luc, "not a code").await.unwrap_err();
        assert!(matches!(err, ReferralError::UnknownReferralCode));
    }

    #[tokio::test]
    async fn test_self_referral_is_noop() {
        let store = MemoryStore::new();
        let marie = user_with_code(&store, "marie@example.com", Some("MARYE234")).await;
        let ledger = ReferralLedger::new(&store, &store);

        let outcome = ledger.record_referral(marie, "MARYE234").await.unwrap();
        assert_eq!(outcome, RecordOutcome::SelfReferral);
        assert!(ledger.entries_for_referrer(marie).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_referral_is_noop() {
        let store = MemoryStore::new();
        let marie = user_with_code(&store, "marie@example.com", Some("MARYE234")).await;
        let paul = user_with_code(&store, "paul@example.com", Some("PAUL2345")).await;
        let luc = user_with_code(&store, "luc@example.com", None).await;
        let ledger = ReferralLedger::new(&store, &store);

        ledger.record_referral(luc, "MARYE234").await.unwrap();
        let outcome = ledger.record_referral(luc, "PAUL2345").await.unwrap();
        assert_eq!(outcome, RecordOutcome::AlreadyReferred);

        assert!(ledger.entries_for_referrer(paul).await.unwrap().is_empty());
        let luc_user = store.get_by_id(luc).await.unwrap().unwrap();
        assert_eq!(luc_user.referred_by, Some(marie));
    }

    #[tokio::test]
    async fn test_activate_without_entry() {
        let store = MemoryStore::new();
        let ledger = ReferralLedger::new(&store, &store);
        let err = ledger.activate(UserId::generate()).await.unwrap_err();
        assert!(matches!(err, ReferralError::NotFound));
    }
}
