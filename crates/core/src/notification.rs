//! Notification kinds and per-user delivery preferences.

use serde::{Deserialize, Serialize};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A manager added a product to the catalog.
    ProductAdded,
    /// A manager removed a product from the catalog.
    ProductRemoved,
    /// A customer ordered one of the recipient's products.
    OrderPlaced,
}

impl NotificationKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 3] = [Self::ProductAdded, Self::ProductRemoved, Self::OrderPlaced];

    /// Alert title shown to the recipient.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::ProductAdded => "New Product Added!",
            Self::ProductRemoved => "Product Removed",
            Self::OrderPlaced => "New Order",
        }
    }

    /// Alert body for a product (and, for orders, the customer who placed it).
    #[must_use]
    pub fn body(self, product_title: &str, customer_name: Option<&str>) -> String {
        match self {
            Self::ProductAdded => format!("{product_title} is now available"),
            Self::ProductRemoved => format!("{product_title} is no longer available"),
            Self::OrderPlaced => match customer_name {
                Some(name) => format!("{name} ordered {product_title}"),
                None => format!("New order for {product_title}"),
            },
        }
    }

    /// The stored name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProductAdded => "product_added",
            Self::ProductRemoved => "product_removed",
            Self::OrderPlaced => "order_placed",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn enabled() -> bool {
    true
}

/// Which notification kinds a user wants to receive.
///
/// Stored as JSON on the user row. Keys missing from the stored object fall
/// back to enabled, so older rows pick up new kinds automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default = "enabled")]
    pub product_added: bool,
    #[serde(default = "enabled")]
    pub product_removed: bool,
    #[serde(default = "enabled")]
    pub order_placed: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            product_added: true,
            product_removed: true,
            order_placed: true,
        }
    }
}

impl NotificationPreferences {
    /// Read preferences from stored JSON, merging over the defaults.
    ///
    /// Anything that is not an object (including `null`) yields the defaults.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Whether notifications of `kind` should be delivered.
    #[must_use]
    pub const fn is_enabled(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::ProductAdded => self.product_added,
            NotificationKind::ProductRemoved => self.product_removed,
            NotificationKind::OrderPlaced => self.order_placed,
        }
    }

    /// The kinds currently enabled.
    #[must_use]
    pub fn enabled_kinds(&self) -> Vec<NotificationKind> {
        NotificationKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// True when every kind is switched off.
    #[must_use]
    pub const fn all_disabled(&self) -> bool {
        !self.product_added && !self.product_removed && !self.order_placed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let prefs = NotificationPreferences::default();
        assert_eq!(prefs.enabled_kinds(), NotificationKind::ALL.to_vec());
        assert!(!prefs.all_disabled());
    }

    #[test]
    fn test_missing_keys_fall_back_to_enabled() {
        let prefs = NotificationPreferences::from_json(&json!({ "productAdded": false }));
        assert!(!prefs.is_enabled(NotificationKind::ProductAdded));
        assert!(prefs.is_enabled(NotificationKind::ProductRemoved));
        assert!(prefs.is_enabled(NotificationKind::OrderPlaced));
    }

    #[test]
    fn test_non_object_json_yields_defaults() {
        assert_eq!(
            NotificationPreferences::from_json(&serde_json::Value::Null),
            NotificationPreferences::default()
        );
        assert_eq!(
            NotificationPreferences::from_json(&json!("garbage")),
            NotificationPreferences::default()
        );
    }

    #[test]
    fn test_all_disabled() {
        let prefs = NotificationPreferences {
            product_added: false,
            product_removed: false,
            order_placed: false,
        };
        assert!(prefs.all_disabled());
        assert!(prefs.enabled_kinds().is_empty());
    }

    #[test]
    fn test_titles() {
        assert_eq!(NotificationKind::ProductAdded.title(), "New Product Added!");
        assert_eq!(NotificationKind::ProductRemoved.title(), "Product Removed");
        assert_eq!(
            NotificationKind::OrderPlaced.body("Kacchi Biryani", Some("Rahim")),
            "Rahim ordered Kacchi Biryani"
        );
    }
}
