//! Password hashing on a bounded blocking pool.
//!
//! Argon2id is deliberately slow, so hashing and verification run on
//! `spawn_blocking` threads. A semaphore caps how many run at once so a burst
//! of logins cannot starve the blocking pool.

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::sync::Semaphore;

use super::AuthError;

/// Hashes and verifies passwords with at most `workers` concurrent jobs.
#[derive(Clone)]
pub struct HashingPool {
    permits: Arc<Semaphore>,
    params: Params,
    /// Verified against on unknown-email logins so they take as long as real ones.
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for HashingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingPool")
            .field("available", &self.permits.available_permits())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl HashingPool {
    /// Create a pool using the default Argon2id parameters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if the dummy hash cannot be computed.
    pub fn new(workers: usize) -> Result<Self, AuthError> {
        Self::with_params(workers, Params::default())
    }

    /// Create a pool with explicit Argon2id parameters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if the dummy hash cannot be computed.
    pub fn with_params(workers: usize, params: Params) -> Result<Self, AuthError> {
        let dummy_hash = hash_with(&params, "garden-companion-dummy-password")?;
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            params,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Hash a password with a fresh random salt. Returns a PHC string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if hashing fails and
    /// `AuthError::WorkerPoolClosed` if the pool is shut down.
    pub async fn hash(&self, password: String) -> Result<String, AuthError> {
        let params = self.params.clone();
        self.run(move || hash_with(&params, &password)).await
    }

    /// Verify a password against a PHC string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on mismatch or an unparsable hash.
    pub async fn verify(&self, password: String, hash: String) -> Result<(), AuthError> {
        self.run(move || verify_password(&password, &hash)).await
    }

    /// Run a verification that always fails, taking as long as a real one.
    pub async fn verify_dummy(&self, password: String) {
        let hash = self.dummy_hash.to_string();
        // Outcome is irrelevant; only the time spent matters.
        let _ = self.verify(password, hash).await;
    }

    async fn run<T, F>(&self, job: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> Result<T, AuthError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AuthError::WorkerPoolClosed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing task failed");
            AuthError::PasswordHash
        })?
    }
}

/// Hash a password using Argon2id.
fn hash_with(params: &Params, password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
