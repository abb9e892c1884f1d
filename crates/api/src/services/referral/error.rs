//! Referral error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during referral operations.
#[derive(Debug, Error)]
pub enum ReferralError {
    /// No user owns the given referral code (or the code is malformed).
    #[error("unknown referral code")]
    UnknownReferralCode,

    /// Every generated code collided with an existing one.
    #[error("could not assign a unique referral code after {0} attempts")]
    CodeAssignmentExhausted(usize),

    /// No ledger entry exists for the referee.
    #[error("referral not found")]
    NotFound,

    /// The user the operation refers to does not exist.
    #[error("user not found")]
    UserNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
