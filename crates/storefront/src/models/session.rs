//! Session-related types.
//!
//! Types stored in the session for authentication and cart state.

use serde::{Deserialize, Serialize};

use freshbites_core::{UserId, UserRole, Username};

use super::User;

/// Session-stored user identity.
///
/// A snapshot only: the auth extractors reload it from the database on
/// every request and write it back when the role or premium flag changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub username: Username,
    pub name: String,
    pub role: UserRole,
    pub is_premium: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
            is_premium: user.is_premium,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for storing the cart.
    pub const CART: &str = "cart";
}
