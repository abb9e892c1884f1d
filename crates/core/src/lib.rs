//! Garden Companion Core - Shared types library.
//!
//! This crate provides the domain types used across the Garden Companion components:
//! - `api` - Public JSON API (identity, profiles, referrals, admin content)
//! - `cli` - Command-line tools for migrations and out-of-band administration
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, referral codes, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
