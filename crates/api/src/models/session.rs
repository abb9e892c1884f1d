//! Request identity types.

use garden_core::{Email, UserId};

use super::User;

/// The identity resolved by the access-control gate for the current request.
///
/// Inserted into request extensions once per request; handlers read it through
/// the [`Identity`](crate::middleware::Identity) extractor.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Whether the user passed the admin check.
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}
