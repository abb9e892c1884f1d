//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::GardenConfig;
use crate::db::Store;
use crate::services::auth::{AuthError, CredentialStore, HashingPool, TokenError, TokenService};
use crate::services::referral::{ReferralCodeGenerator, ReferralLedger, RewardPolicy};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("token service: {0}")]
    Token(#[from] TokenError),
    #[error("hashing pool: {0}")]
    Hashing(#[from] AuthError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store, token service and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GardenConfig,
    store: Store,
    tokens: TokenService,
    hasher: HashingPool,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the token key is unusable or the hashing pool
    /// cannot be initialized.
    pub fn new(config: GardenConfig, store: Store) -> Result<Self, StateError> {
        let hasher = HashingPool::new(config.hash_workers)?;
        Self::with_hasher(config, store, hasher)
    }

    /// Create a new application state with an explicit hashing pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the token key is unusable.
    pub fn with_hasher(
        config: GardenConfig,
        store: Store,
        hasher: HashingPool,
    ) -> Result<Self, StateError> {
        let tokens = TokenService::new(&config.token.secret, config.token.ttl)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                hasher,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &GardenConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the reward policy.
    #[must_use]
    pub fn rewards(&self) -> &RewardPolicy {
        &self.inner.config.rewards
    }

    /// Credential store over this state's repositories.
    #[must_use]
    pub fn credentials(&self) -> CredentialStore<'_> {
        CredentialStore::new(self.inner.store.users(), &self.inner.hasher)
    }

    /// Referral code generator over this state's repositories.
    #[must_use]
    pub fn referral_codes(&self) -> ReferralCodeGenerator<'_> {
        ReferralCodeGenerator::new(self.inner.store.users(), &self.inner.config.public_url)
    }

    /// Referral ledger over this state's repositories.
    #[must_use]
    pub fn ledger(&self) -> ReferralLedger<'_> {
        ReferralLedger::new(self.inner.store.users(), self.inner.store.referrals())
    }
}
