//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use garden_core::{Email, ReferralCode, UserId};

/// A registered user (domain type).
///
/// The password hash is deliberately not part of this type; it is only ever
/// loaded alongside a user by the credential lookups in the user repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized (lower-case) email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Optional given name.
    pub first_name: Option<String>,
    /// Optional family name.
    pub last_name: Option<String>,
    /// Whether this user may call admin routes.
    pub is_admin: bool,
    /// Referral code, assigned on first request.
    pub referral_code: Option<ReferralCode>,
    /// The user who referred this one, set once at registration.
    pub referred_by: Option<UserId>,
    /// Bumped whenever credentials change; tokens carrying an older version are rejected.
    pub token_version: i32,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Referrer to attribute the account to. A pending ledger entry is
    /// written together with the user.
    pub referred_by: Option<UserId>,
}

/// A validated set of profile changes.
///
/// `None` leaves a field untouched. For the optional name parts,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Apply the changes to an in-memory user.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(first_name) = &self.first_name {
            user.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &self.last_name {
            user.last_name.clone_from(last_name);
        }
    }
}

/// Public profile view returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub referral_code: Option<ReferralCode>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_admin: user.is_admin,
            referral_code: user.referral_code.clone(),
            created_at: user.created_at,
        }
    }
}
