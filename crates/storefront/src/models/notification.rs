//! Notification records and the events that produce them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshbites_core::{NotificationId, NotificationKind, ProductId, UserId};

use super::{Order, Product};

/// A notification delivered to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub product_id: Option<ProductId>,
    pub product_title: String,
    pub product_image: Option<String>,
    pub customer_name: Option<String>,
    /// The user whose action produced this notification.
    pub created_by_user: Option<UserId>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Alert title for this notification.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        self.kind.title()
    }

    /// Alert body for this notification.
    #[must_use]
    pub fn body(&self) -> String {
        self.kind
            .body(&self.product_title, self.customer_name.as_deref())
    }
}

/// A ready-to-render alert for a delivered notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationAlert {
    pub title: &'static str,
    pub body: String,
    pub notification: Notification,
}

impl From<Notification> for NotificationAlert {
    fn from(notification: Notification) -> Self {
        Self {
            title: notification.title(),
            body: notification.body(),
            notification,
        }
    }
}

/// Something that happened which users may need to hear about.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// `actor` added `product` to the catalog.
    ProductAdded { product: Product, actor: UserId },
    /// `actor` removed `product` from the catalog.
    ProductRemoved { product: Product, actor: UserId },
    /// A customer placed `order`; `product_owner` created the product.
    OrderPlaced {
        order: Order,
        product_image: Option<String>,
        product_owner: Option<UserId>,
    },
}

impl NotificationEvent {
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::ProductAdded { .. } => NotificationKind::ProductAdded,
            Self::ProductRemoved { .. } => NotificationKind::ProductRemoved,
            Self::OrderPlaced { .. } => NotificationKind::OrderPlaced,
        }
    }

    /// The user who caused the event. Never notified about their own action.
    #[must_use]
    pub const fn actor(&self) -> UserId {
        match self {
            Self::ProductAdded { actor, .. } | Self::ProductRemoved { actor, .. } => *actor,
            Self::OrderPlaced { order, .. } => order.customer_id,
        }
    }
}
