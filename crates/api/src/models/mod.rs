//! Domain models for the API.
//!
//! These are the typed records the rest of the crate works with. Database rows
//! are decoded into them in [`crate::db`]; anything that fails to decode is
//! treated as corrupt data rather than read as a partial record.

pub mod content;
pub mod referral;
pub mod session;
pub mod user;

pub use content::ContentItem;
pub use referral::ReferralEntry;
pub use session::CurrentUser;
pub use user::{NewUser, ProfileUpdate, User};
