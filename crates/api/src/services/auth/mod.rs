//! Authentication service.
//!
//! Provides registration, password login, password change and profile
//! updates. Passwords are hashed with Argon2id on [`HashingPool`]; bearer
//! tokens are issued by [`TokenService`].

mod error;
mod password;
mod token;

pub use error::AuthError;
pub use password::HashingPool;
pub use token::{Claims, IssuedToken, TokenError, TokenService};

use serde_json::{Map, Value};

use garden_core::{Email, UserId};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{NewUser, ProfileUpdate, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length of a name field.
const MAX_NAME_LENGTH: usize = 100;

/// Fields a user may change on their own profile.
const PROFILE_FIELDS: &[&str] = &["name", "firstName", "lastName"];

/// Registration input, before validation.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Resolved owner of the referral code supplied at sign-up.
    pub referrer: Option<UserId>,
}

/// Credential store.
///
/// The only writer of identity and credential fields.
pub struct CredentialStore<'a> {
    users: &'a dyn UserRepository,
    hasher: &'a HashingPool,
}

impl<'a> CredentialStore<'a> {
    /// Create a new credential store.
    #[must_use]
    pub const fn new(users: &'a dyn UserRepository, hasher: &'a HashingPool) -> Self {
        Self { users, hasher }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::InvalidName` if a name field is out of bounds.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    ///
    /// With a `referrer`, the account and its pending referral entry are
    /// created together; if either write fails, neither is kept.
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        let name = validate_name(&registration.name)?;
        let first_name = validate_optional_name(registration.first_name.as_deref())?;
        let last_name = validate_optional_name(registration.last_name.as_deref())?;

        let password_hash = self.hasher.hash(registration.password).await?;

        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                name,
                first_name,
                last_name,
                referred_by: registration.referrer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(
            user_id = %user.id,
            referrer_id = ?user.referred_by,
            "User registered"
        );
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// Unknown and malformed emails fail exactly like a wrong password, after
    /// spending the same hashing time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let credentials = match Email::parse(email) {
            Ok(email) => self.users.get_credentials_by_email(&email).await?,
            Err(_) => None,
        };

        let Some((user, password_hash)) = credentials else {
            self.hasher.verify_dummy(password.to_owned()).await;
            return Err(AuthError::InvalidCredentials);
        };

        self.hasher
            .verify(password.to_owned(), password_hash)
            .await?;

        Ok(user)
    }

    /// Change a user's password.
    ///
    /// On success the token version is bumped in the same write, so tokens
    /// issued before the change stop working.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<User, AuthError> {
        let password_hash = self
            .users
            .get_password_hash(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.hasher.verify(current.to_owned(), password_hash).await?;
        validate_password(new)?;

        let new_hash = self.hasher.hash(new.to_owned()).await?;
        let user = self
            .users
            .update_password(user_id, &new_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(user)
    }

    /// Apply a validated profile update.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, AuthError> {
        self.users
            .update_profile(user_id, update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Build a [`ProfileUpdate`] from a raw JSON object.
///
/// Only `name`, `firstName` and `lastName` are accepted. Any other key,
/// including `isAdmin`, `email` and `referralCode`, rejects the whole update.
///
/// # Errors
///
/// Returns `AuthError::InvalidProfileUpdate` for a forbidden key or a value of
/// the wrong type, and `AuthError::InvalidName` for an out-of-bounds name.
pub fn parse_profile_update(fields: &Map<String, Value>) -> Result<ProfileUpdate, AuthError> {
    if let Some(key) = fields.keys().find(|k| !PROFILE_FIELDS.contains(&k.as_str())) {
        return Err(AuthError::InvalidProfileUpdate(format!(
            "field '{key}' cannot be updated"
        )));
    }

    let name = match fields.get("name") {
        None => None,
        Some(Value::String(s)) => Some(validate_name(s)?),
        Some(_) => {
            return Err(AuthError::InvalidProfileUpdate(
                "name must be a string".to_owned(),
            ));
        }
    };

    Ok(ProfileUpdate {
        name,
        first_name: optional_name_field(fields, "firstName")?,
        last_name: optional_name_field(fields, "lastName")?,
    })
}

/// `None` if absent, `Some(None)` to clear, `Some(Some(_))` to set.
fn optional_name_field(
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<Option<String>>, AuthError> {
    match fields.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(validate_optional_name(Some(s))?)),
        Some(_) => Err(AuthError::InvalidProfileUpdate(format!(
            "{key} must be a string or null"
        ))),
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(AuthError::WeakPassword(
            "password must contain a letter".to_owned(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "password must contain a digit".to_owned(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String, AuthError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidName("name is required".to_owned()));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Blank optional names are stored as absent.
fn validate_optional_name(name: Option<&str>) -> Result<Option<String>, AuthError> {
    match name.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => validate_name(name).map(Some),
    }
}
