//! Core types for Garden Companion.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod referral_code;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use referral_code::{ReferralCode, ReferralCodeError};
pub use status::*;
