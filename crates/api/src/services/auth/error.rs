//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] garden_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Name missing or out of bounds.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Profile update names a field that cannot be changed or has the wrong type.
    #[error("invalid profile update: {0}")]
    InvalidProfileUpdate(String),

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// The hashing pool no longer accepts work.
    #[error("password hashing pool closed")]
    WorkerPoolClosed,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
