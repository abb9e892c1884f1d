//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GARDEN_DATABASE_URL` - `PostgreSQL` connection string, or `memory://` for
//!   the in-memory store (falls back to `DATABASE_URL`)
//! - `GARDEN_TOKEN_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `GARDEN_DATABASE_NAME` - Database name, overriding the one in the URL
//! - `GARDEN_HOST` - Bind address (default: 127.0.0.1)
//! - `GARDEN_PORT` - Listen port (default: 8080)
//! - `GARDEN_PUBLIC_URL` - Public base URL used in share links (default: <http://localhost:8080>)
//! - `GARDEN_TOKEN_TTL_HOURS` - Token lifetime in hours (default: 168, max: 8760)
//! - `GARDEN_HASH_WORKERS` - Concurrent password hashing jobs (default: available parallelism)
//! - `GARDEN_REWARD_DAYS_PER_REFERRAL` - Premium days per active referral (default: 30)
//! - `GARDEN_REWARD_TIERS` - `THRESHOLD:BADGE` pairs, comma separated
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 1.0)
//!
//! Read directly by `main`, not part of [`GardenConfig`]:
//! - `RUST_LOG` - Tracing filter (default: `garden_api=info,tower_http=debug`)
//! - `LOG_FORMAT` - `json` for structured logs

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use crate::services::referral::{
    DEFAULT_REWARD_DAYS_PER_REFERRAL, DEFAULT_REWARD_TIERS, RewardPolicy, RewardTable,
};

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TOKEN_TTL_HOURS: i64 = 168;
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API configuration.
#[derive(Debug, Clone)]
pub struct GardenConfig {
    /// Store connection settings
    pub database: DatabaseConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build referral share links
    pub public_url: String,
    /// Bearer token settings
    pub token: TokenConfig,
    /// Maximum concurrent password hashing jobs
    pub hash_workers: usize,
    /// Referral reward policy
    pub rewards: RewardPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Store connection settings.
///
/// Implements `Debug` manually to redact the URL, which may hold a password.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// `postgres://...` or `memory://`
    pub url: SecretString,
    /// Database name overriding the one in the URL
    pub name: Option<String>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Bearer token settings.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Token lifetime
    pub ttl: chrono::Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl GardenConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig::from_env()?;
        let host = get_parsed_or_default::<IpAddr>("GARDEN_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("GARDEN_PORT", "8080")?;
        let public_url = get_env_or_default("GARDEN_PUBLIC_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_owned();
        let token = TokenConfig::from_env()?;
        let hash_workers = match get_optional_env("GARDEN_HASH_WORKERS") {
            Some(value) => parse_hash_workers(&value)?,
            None => std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        };
        let rewards = RewardPolicy {
            days_per_referral: get_parsed_or_default(
                "GARDEN_REWARD_DAYS_PER_REFERRAL",
                &DEFAULT_REWARD_DAYS_PER_REFERRAL.to_string(),
            )?,
            tiers: get_parsed_or_default::<RewardTable>("GARDEN_REWARD_TIERS", DEFAULT_REWARD_TIERS)?,
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database,
            host,
            port,
            public_url,
            token,
            hash_workers,
            rewards,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl DatabaseConfig {
    /// Load store settings only.
    ///
    /// Used by tooling that talks to the database without serving requests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no database URL is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: get_database_url("GARDEN_DATABASE_URL")?,
            name: get_optional_env("GARDEN_DATABASE_NAME"),
        })
    }
}

impl TokenConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_required_env("GARDEN_TOKEN_SECRET")?;
        validate_token_secret(&secret, "GARDEN_TOKEN_SECRET")?;
        let secret = SecretString::from(secret);

        let hours = get_parsed_or_default::<i64>(
            "GARDEN_TOKEN_TTL_HOURS",
            &DEFAULT_TOKEN_TTL_HOURS.to_string(),
        )?;
        let ttl = parse_token_ttl(hours)?;

        Ok(Self { secret, ttl })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable (or default) parsed into `T`.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_hash_workers(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::InvalidEnvVar(
            "GARDEN_HASH_WORKERS".to_string(),
            "must be at least 1".to_string(),
        )),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "GARDEN_HASH_WORKERS".to_string(),
            e.to_string(),
        )),
    }
}

fn parse_token_ttl(hours: i64) -> Result<chrono::Duration, ConfigError> {
    if hours <= 0 {
        return Err(ConfigError::InvalidEnvVar(
            "GARDEN_TOKEN_TTL_HOURS".to_string(),
            "must be positive".to_string(),
        ));
    }
    if hours > MAX_TOKEN_TTL_HOURS {
        return Err(ConfigError::InvalidEnvVar(
            "GARDEN_TOKEN_TTL_HOURS".to_string(),
            format!("must be at most {MAX_TOKEN_TTL_HOURS}"),
        ));
    }
    chrono::Duration::try_hours(hours).ok_or_else(|| {
        ConfigError::InvalidEnvVar(
            "GARDEN_TOKEN_TTL_HOURS".to_string(),
            "out of range".to_string(),
        )
    })
}

/// Reject secrets that are short, look like placeholders, or are too repetitive.
fn validate_token_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| ConfigError::InsecureSecret(var_name.to_string(), reason);

    let length = secret.chars().count();
    if length < MIN_TOKEN_SECRET_LENGTH {
        return Err(insecure(format!(
            "must be at least {MIN_TOKEN_SECRET_LENGTH} characters (got {length})"
        )));
    }

    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(**p)) {
        return Err(insecure(format!(
            "appears to be a placeholder (contains '{pattern}')"
        )));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). \
             Use a randomly generated secret."
        )));
    }

    Ok(())
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0_u32;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}
