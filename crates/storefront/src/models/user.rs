//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshbites_core::{Email, NotificationPreferences, UserId, UserRole, Username};

/// A storefront account.
///
/// Serialized as the profile returned by `/api/auth/me` and `/api/profile`.
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: UserRole,
    /// Always equal to `role.grants_premium()`; the database writes both together.
    pub is_premium: bool,
    pub notification_preferences: NotificationPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}
