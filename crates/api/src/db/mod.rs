//! Persistence layer.
//!
//! # Database: `garden` schema in `PostgreSQL`
//!
//! ## Tables
//!
//! - `garden.user` - Identity records (credentials, profile, admin flag, referral fields)
//! - `garden.referral` - Referral ledger entries (one per referee)
//! - `garden.content_item` - Admin-managed content documents
//!
//! # Repositories
//!
//! Each table is accessed through a repository trait so the same services run
//! against `PostgreSQL` in production and against [`memory::MemoryStore`] in
//! tests and local development. A [`Store`] bundles one implementation of
//! each and is constructed explicitly by the process entry point.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p garden-cli -- migrate
//! ```

pub mod content;
pub mod memory;
pub mod referrals;
pub mod users;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

use garden_core::{ContentKind, Email, ReferralCode, UserId};

use crate::config::DatabaseConfig;
use crate::models::{ContentItem, NewUser, ProfileUpdate, ReferralEntry, User};

pub use content::PgContentRepository;
pub use memory::MemoryStore;
pub use referrals::PgReferralRepository;
pub use users::PgUserRepository;

/// URL scheme selecting the in-memory store.
pub const MEMORY_URL: &str = "memory://";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a sqlx error, turning unique violations into [`RepositoryError::Conflict`].
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Access to identity records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// When `new_user.referred_by` is set, the pending referral entry is
    /// written in the same transaction: either both rows exist afterwards or
    /// neither does.
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError>;

    /// Get a user by ID.
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Get a user by (normalized) email.
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Get the user owning a referral code.
    async fn get_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<User>, RepositoryError>;

    /// Get a user together with their password hash, by email.
    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Get a user's password hash by ID.
    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    /// Replace the password hash and bump the token version in one write.
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn update_password(&self, id: UserId, password_hash: &str)
    -> Result<User, RepositoryError>;

    /// Apply whitelisted profile changes.
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError>;

    /// Set the referral code only if the user has none yet.
    ///
    /// Returns `true` if this call assigned the code, `false` if the user
    /// already had one. Returns `RepositoryError::Conflict` if another user
    /// owns the code.
    async fn assign_referral_code(
        &self,
        id: UserId,
        code: &ReferralCode,
    ) -> Result<bool, RepositoryError>;

    /// Set `referred_by` only if it is not set yet.
    ///
    /// Returns `true` if this call set it.
    async fn set_referred_by(&self, id: UserId, referrer: UserId)
    -> Result<bool, RepositoryError>;

    /// Set the admin flag. Used only by out-of-band tooling.
    async fn set_admin(&self, email: &Email, is_admin: bool)
    -> Result<Option<User>, RepositoryError>;

    /// Count all users.
    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// Access to the referral ledger.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Insert a pending entry.
    ///
    /// Returns `RepositoryError::Conflict` if the referee already has an entry.
    async fn create(
        &self,
        referrer_id: UserId,
        referee_id: UserId,
    ) -> Result<ReferralEntry, RepositoryError>;

    /// Get the entry for a referee.
    async fn get_by_referee(
        &self,
        referee_id: UserId,
    ) -> Result<Option<ReferralEntry>, RepositoryError>;

    /// Transition the referee's entry from pending to active.
    ///
    /// Returns `true` if this call performed the transition, `false` if no
    /// pending entry matched.
    async fn activate(
        &self,
        referee_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// All entries credited to a referrer, oldest first.
    async fn list_by_referrer(
        &self,
        referrer_id: UserId,
    ) -> Result<Vec<ReferralEntry>, RepositoryError>;

    /// Ledger-wide `(total, active)` counts.
    async fn counts(&self) -> Result<(i64, i64), RepositoryError>;
}

/// Access to admin content documents.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Store a new document.
    async fn insert(
        &self,
        kind: ContentKind,
        body: serde_json::Value,
        created_by: UserId,
    ) -> Result<ContentItem, RepositoryError>;

    /// List documents of one kind, newest first.
    async fn list(&self, kind: ContentKind) -> Result<Vec<ContentItem>, RepositoryError>;

    /// Count documents of one kind.
    async fn count(&self, kind: ContentKind) -> Result<i64, RepositoryError>;
}

/// Which backend a [`Store`] talks to.
#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory,
}

/// Handle to all repositories.
///
/// Cheaply cloneable. Built once at startup and closed on shutdown by the
/// process entry point.
#[derive(Clone)]
pub struct Store {
    users: Arc<dyn UserRepository>,
    referrals: Arc<dyn ReferralRepository>,
    content: Arc<dyn ContentRepository>,
    backend: Backend,
}

impl Store {
    /// Connect to the configured backend.
    ///
    /// A URL of `memory://` selects the in-memory store; anything else is
    /// treated as a `PostgreSQL` connection string.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the connection string is invalid or the
    /// connection cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        if config.url.expose_secret().starts_with(MEMORY_URL) {
            tracing::warn!("Using in-memory store; data will not survive a restart");
            return Ok(Self::in_memory());
        }

        let pool = create_pool(config).await?;
        Ok(Self::postgres(pool))
    }

    /// Build a store over an existing `PostgreSQL` pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            referrals: Arc::new(PgReferralRepository::new(pool.clone())),
            content: Arc::new(PgContentRepository::new(pool.clone())),
            backend: Backend::Postgres(pool),
        }
    }

    /// Build an empty in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        let memory = MemoryStore::new();
        Self {
            users: Arc::new(memory.clone()),
            referrals: Arc::new(memory.clone()),
            content: Arc::new(memory),
            backend: Backend::Memory,
        }
    }

    /// User repository.
    #[must_use]
    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    /// Referral ledger repository.
    #[must_use]
    pub fn referrals(&self) -> &dyn ReferralRepository {
        self.referrals.as_ref()
    }

    /// Admin content repository.
    #[must_use]
    pub fn content(&self) -> &dyn ContentRepository {
        self.content.as_ref()
    }

    /// Check the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            Backend::Memory => Ok(()),
        }
    }

    /// Close the underlying connections.
    pub async fn close(&self) {
        if let Backend::Postgres(pool) = &self.backend {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// If `config.name` is set it overrides the database named in the URL.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let mut options = PgConnectOptions::from_str(config.url.expose_secret())?;
    if let Some(name) = &config.name {
        options = options.database(name);
    }

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
