//! Role and status enums shared by the API and the database.

use serde::{Deserialize, Serialize};

/// Account role.
///
/// Premium access is derived from the role: both `premium` and `manager`
/// accounts see the premium menu, `normal` accounts do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular customer.
    #[default]
    Normal,
    /// Customer with the premium unlock.
    Premium,
    /// Store manager; can edit the catalog and see orders for their products.
    Manager,
}

impl UserRole {
    /// Whether this role carries premium access.
    #[must_use]
    pub const fn grants_premium(self) -> bool {
        matches!(self, Self::Premium | Self::Manager)
    }

    /// Whether this role may manage the catalog.
    #[must_use]
    pub const fn is_manager(self) -> bool {
        matches!(self, Self::Manager)
    }

    /// Whether a user currently holding `self` may switch themselves to `target`.
    ///
    /// `normal` and `premium` are self-service; only an existing manager may
    /// hold or keep the `manager` role.
    #[must_use]
    pub const fn can_switch_to(self, target: Self) -> bool {
        match target {
            Self::Normal | Self::Premium => true,
            Self::Manager => self.is_manager(),
        }
    }

    /// The database/API name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Premium => "premium",
            Self::Manager => "manager",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "premium" => Ok(Self::Premium),
            "manager" => Ok(Self::Manager),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Order status.
///
/// Orders are created `pending`; nothing in the storefront moves them on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Device platform reported when registering for push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    /// The stored name of the platform.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_follows_role() {
        assert!(!UserRole::Normal.grants_premium());
        assert!(UserRole::Premium.grants_premium());
        assert!(UserRole::Manager.grants_premium());
    }

    #[test]
    fn test_manager_role_is_not_self_service() {
        assert!(UserRole::Normal.can_switch_to(UserRole::Premium));
        assert!(UserRole::Premium.can_switch_to(UserRole::Normal));
        assert!(!UserRole::Normal.can_switch_to(UserRole::Manager));
        assert!(!UserRole::Premium.can_switch_to(UserRole::Manager));
        assert!(UserRole::Manager.can_switch_to(UserRole::Manager));
    }

    #[test]
    fn test_role_parse_and_display() {
        for role in [UserRole::Normal, UserRole::Premium, UserRole::Manager] {
            assert_eq!(role.to_string().parse::<UserRole>(), Ok(role));
        }
        assert_eq!(" Manager ".parse::<UserRole>(), Ok(UserRole::Manager));
        assert!("admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_order_status_defaults_to_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
    }
}
