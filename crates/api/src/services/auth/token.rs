//! Signed bearer tokens.
//!
//! # Format
//!
//! ```text
//! base64url(json claims) "." base64url(hmac-sha256(encoded claims))
//! ```
//!
//! Both parts use the URL-safe alphabet without padding. There is no
//! server-side session store: a token is valid while its signature matches,
//! it has not expired, and its `ver` equals the user's current token version
//! (checked by the access-control gate).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use garden_core::UserId;

use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Errors from issuing or verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's expiry has passed.
    #[error("token expired")]
    Expired,

    /// Malformed encoding or signature mismatch.
    #[error("token invalid")]
    Invalid,

    /// Claims could not be serialized.
    #[error("token encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The expiry falls outside the representable date range.
    #[error("token lifetime out of range")]
    Lifetime,
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: UserId,
    /// Issued at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expires at, seconds since the Unix epoch.
    pub exp: i64,
    /// The subject's token version at issue time.
    pub ver: i32,
}

impl Claims {
    /// When the token stops being accepted.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer tokens with a process-wide HMAC key.
#[derive(Clone)]
pub struct TokenService {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("key", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Create a token service.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the key cannot be used for HMAC.
    pub fn new(secret: &SecretString, ttl: Duration) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Invalid)?;
        Ok(Self { mac, ttl })
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a user, starting now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Lifetime` if the expiry is out of range and
    /// `TokenError::Encode` if the claims cannot be serialized.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Lifetime` if `now + ttl` overflows and
    /// `TokenError::Encode` if the claims cannot be serialized.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::Lifetime)?;
        let claims = Claims {
            sub: user.id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            ver: user.token_version,
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));

        Ok(IssuedToken {
            token: format!("{payload}.{signature}"),
            expires_at,
        })
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for a malformed or forged token and
    /// `TokenError::Expired` once its expiry has passed.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for a malformed or forged token and
    /// `TokenError::Expired` if `now` is at or after its expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Invalid)?;

        // verify_slice compares in constant time
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::Invalid)?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| TokenError::Invalid)?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}
