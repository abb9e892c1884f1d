//! In-memory store.
//!
//! Implements every repository trait over a single mutex-guarded state so the
//! API can run without `PostgreSQL` (tests, local development). Uniqueness
//! rules mirror the database constraints: email, referral code, and referee
//! are unique, and conditional updates only apply when their guard holds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use garden_core::{ContentId, ContentKind, Email, ReferralCode, ReferralId, ReferralStatus, UserId};

use super::{ContentRepository, ReferralRepository, RepositoryError, UserRepository};
use crate::models::{ContentItem, NewUser, ProfileUpdate, ReferralEntry, User};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, StoredUser>,
    referrals: Vec<ReferralEntry>,
    content: Vec<ContentItem>,
}

impl State {
    fn user_mut(&mut self, id: UserId) -> Result<&mut StoredUser, RepositoryError> {
        self.users.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn find_user(&self, pred: impl Fn(&User) -> bool) -> Option<&StoredUser> {
        self.users.values().find(|stored| pred(&stored.user))
    }
}

/// Shared in-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.find_user(|u| u.email == new_user.email).is_some() {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        if let Some(referrer_id) = new_user.referred_by
            && !state.users.contains_key(&referrer_id)
        {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            email: new_user.email,
            name: new_user.name,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            is_admin: false,
            referral_code: None,
            referred_by: new_user.referred_by,
            token_version: 0,
            created_at: now,
            updated_at: now,
        };

        // Both writes happen under the same lock.
        if let Some(referrer_id) = new_user.referred_by {
            state.referrals.push(ReferralEntry {
                id: ReferralId::generate(),
                referrer_id,
                referee_id: user.id,
                status: ReferralStatus::Pending,
                created_at: now,
                activated_at: None,
            });
        }

        state.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );

        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|s| s.user.clone()))
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.find_user(|u| &u.email == email).map(|s| s.user.clone()))
    }

    async fn get_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .find_user(|u| u.referral_code.as_ref() == Some(code))
            .map(|s| s.user.clone()))
    }

    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .find_user(|u| &u.email == email)
            .map(|s| (s.user.clone(), s.password_hash.clone())))
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|s| s.password_hash.clone()))
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state.user_mut(id)?;
        password_hash.clone_into(&mut stored.password_hash);
        stored.user.token_version += 1;
        stored.user.updated_at = Utc::now();
        Ok(stored.user.clone())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state.user_mut(id)?;
        update.apply_to(&mut stored.user);
        stored.user.updated_at = Utc::now();
        Ok(stored.user.clone())
    }

    async fn assign_referral_code(
        &self,
        id: UserId,
        code: &ReferralCode,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;

        if state
            .find_user(|u| u.id != id && u.referral_code.as_ref() == Some(code))
            .is_some()
        {
            return Err(RepositoryError::Conflict(
                "referral code already exists".to_owned(),
            ));
        }

        let Some(stored) = state.users.get_mut(&id) else {
            return Ok(false);
        };
        if stored.user.referral_code.is_some() {
            return Ok(false);
        }

        stored.user.referral_code = Some(code.clone());
        stored.user.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_referred_by(
        &self,
        id: UserId,
        referrer: UserId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;

        let Some(stored) = state.users.get_mut(&id) else {
            return Ok(false);
        };
        if stored.user.referred_by.is_some() || id == referrer {
            return Ok(false);
        }

        stored.user.referred_by = Some(referrer);
        stored.user.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_admin(
        &self,
        email: &Email,
        is_admin: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let mut state = self.state.lock().await;

        let Some(stored) = state.users.values_mut().find(|s| &s.user.email == email) else {
            return Ok(None);
        };

        stored.user.is_admin = is_admin;
        stored.user.updated_at = Utc::now();
        Ok(Some(stored.user.clone()))
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        Ok(i64::try_from(state.users.len()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl ReferralRepository for MemoryStore {
    async fn create(
        &self,
        referrer_id: UserId,
        referee_id: UserId,
    ) -> Result<ReferralEntry, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.referrals.iter().any(|r| r.referee_id == referee_id) {
            return Err(RepositoryError::Conflict(
                "referral for this referee already exists".to_owned(),
            ));
        }

        let entry = ReferralEntry {
            id: ReferralId::generate(),
            referrer_id,
            referee_id,
            status: ReferralStatus::Pending,
            created_at: Utc::now(),
            activated_at: None,
        };
        state.referrals.push(entry.clone());

        Ok(entry)
    }

    async fn get_by_referee(
        &self,
        referee_id: UserId,
    ) -> Result<Option<ReferralEntry>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .iter()
            .find(|r| r.referee_id == referee_id)
            .cloned())
    }

    async fn activate(
        &self,
        referee_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;

        let Some(entry) = state
            .referrals
            .iter_mut()
            .find(|r| r.referee_id == referee_id && r.status == ReferralStatus::Pending)
        else {
            return Ok(false);
        };

        entry.status = ReferralStatus::Active;
        entry.activated_at = Some(at);
        Ok(true)
    }

    async fn list_by_referrer(
        &self,
        referrer_id: UserId,
    ) -> Result<Vec<ReferralEntry>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .iter()
            .filter(|r| r.referrer_id == referrer_id)
            .cloned()
            .collect())
    }

    async fn counts(&self) -> Result<(i64, i64), RepositoryError> {
        let state = self.state.lock().await;
        let total = state.referrals.len();
        let active = state
            .referrals
            .iter()
            .filter(|r| r.status.is_active())
            .count();
        Ok((
            i64::try_from(total).unwrap_or(i64::MAX),
            i64::try_from(active).unwrap_or(i64::MAX),
        ))
    }
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn insert(
        &self,
        kind: ContentKind,
        body: serde_json::Value,
        created_by: UserId,
    ) -> Result<ContentItem, RepositoryError> {
        let mut state = self.state.lock().await;

        let item = ContentItem {
            id: ContentId::generate(),
            kind,
            body,
            created_by,
            created_at: Utc::now(),
        };
        state.content.push(item.clone());

        Ok(item)
    }

    async fn list(&self, kind: ContentKind) -> Result<Vec<ContentItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .content
            .iter()
            .rev()
            .filter(|item| item.kind == kind)
            .cloned()
            .collect())
    }

    async fn count(&self, kind: ContentKind) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        let count = state.content.iter().filter(|item| item.kind == kind).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_owned(),
            name: "Test".to_owned(),
            first_name: None,
            last_name: None,
            referred_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let store = MemoryStore::new();
        UserRepository::create(&store, new_user("a@example.com"))
            .await
            .unwrap();

        let err = UserRepository::create(&store, new_user("A@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(UserRepository::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_with_referrer_writes_pending_entry() {
        let store = MemoryStore::new();
        let marie = UserRepository::create(&store, new_user("marie@example.com"))
            .await
            .unwrap();

        let luc = UserRepository::create(
            &store,
            NewUser {
                referred_by: Some(marie.id),
                ..new_user("luc@example.com")
            },
        )
        .await
        .unwrap();
        assert_eq!(luc.referred_by, Some(marie.id));

        let entry = store.get_by_referee(luc.id).await.unwrap().unwrap();
        assert_eq!(entry.referrer_id, marie.id);
        assert_eq!(entry.status, ReferralStatus::Pending);
        assert!(entry.activated_at.is_none());
    }

    #[tokio::test]
    async fn test_create_with_unknown_referrer_writes_nothing() {
        let store = MemoryStore::new();

        let err = UserRepository::create(
            &store,
            NewUser {
                referred_by: Some(UserId::generate()),
                ..new_user("luc@example.com")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        assert_eq!(UserRepository::count(&store).await.unwrap(), 0);
        assert_eq!(store.counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_assign_referral_code_only_once() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, new_user("a@example.com"))
            .await
            .unwrap();
        let first = ReferralCode::parse("ABCD2345").unwrap();
        let second = ReferralCode::parse("WXYZ6789").unwrap();

        assert!(store.assign_referral_code(user.id, &first).await.unwrap());
        assert!(!store.assign_referral_code(user.id, &second).await.unwrap());

        let stored = store.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.referral_code, Some(first));
    }

    #[tokio::test]
    async fn test_assign_referral_code_conflict() {
        let store = MemoryStore::new();
        let a = UserRepository::create(&store, new_user("a@example.com"))
            .await
            .unwrap();
        let b = UserRepository::create(&store, new_user("b@example.com"))
            .await
            .unwrap();
        let code = ReferralCode::parse("ABCD2345").unwrap();

        store.assign_referral_code(a.id, &code).await.unwrap();
        let err = store.assign_referral_code(b.id, &code).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_activate_is_single_transition() {
        let store = MemoryStore::new();
        let referrer = UserId::generate();
        let referee = UserId::generate();
        ReferralRepository::create(&store, referrer, referee)
            .await
            .unwrap();

        assert!(store.activate(referee, Utc::now()).await.unwrap());
        assert!(!store.activate(referee, Utc::now()).await.unwrap());
        assert_eq!(store.counts().await.unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn test_update_password_bumps_token_version() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, new_user("a@example.com"))
            .await
            .unwrap();

        let updated = store.update_password(user.id, "new-hash").await.unwrap();
        assert_eq!(updated.token_version, user.token_version + 1);
        assert_eq!(
            store.get_password_hash(user.id).await.unwrap().as_deref(),
            Some("new-hash")
        );
    }
}
