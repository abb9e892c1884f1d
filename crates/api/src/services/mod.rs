//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, password change, profile updates, bearer tokens
//! - `referral` - Referral codes, the referral ledger, and reward stats
//!
//! Services borrow their repositories from [`crate::state::AppState`] for the
//! duration of a request; they hold no state of their own.

pub mod auth;
pub mod referral;
