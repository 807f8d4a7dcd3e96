//! Notification pipeline.
//!
//! `publish` turns a [`NotificationEvent`] into one row per recipient, pushes
//! the rows onto the realtime hub as one batch, and hands push delivery to a background
//! task. Only the row insert can fail the call; the realtime and push legs
//! are best effort.

use futures::Stream;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use freshbites_core::{NotificationId, NotificationPreferences, UserId};

use crate::db::notifications::NotificationContent;
use crate::db::users::Recipient;
use crate::db::{DeviceRepository, NotificationRepository, RepositoryError, UserRepository};
use crate::models::notification::{Notification, NotificationEvent};
use crate::services::push::{PushClient, PushError, messages_for};
use crate::services::realtime::{
    ChangeFilter, ChangeKind, ChangeRow, Delivery, RealtimeHub, Table,
};

/// Default page size for notification lists.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Largest page size a client may ask for.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Errors from the notification service.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// The notification does not exist or belongs to someone else.
    #[error("notification not found")]
    NotFound,

    /// Push gateway error.
    #[error("push error: {0}")]
    Push(#[from] PushError),
}

/// Result of a direct push send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutcome {
    pub success: bool,
    pub devices_notified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Clamp a requested page size to `1..=MAX_LIST_LIMIT`.
#[must_use]
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Notification fan-out, read tracking and preferences.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    hub: RealtimeHub,
    push: PushClient,
}

impl NotificationService {
    #[must_use]
    pub const fn new(pool: PgPool, hub: RealtimeHub, push: PushClient) -> Self {
        Self { pool, hub, push }
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Deliver an event to everyone who should hear about it.
    ///
    /// Product events go to every user except the actor. Order events go to
    /// the creator of the ordered product, unless that is the customer.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if recipients cannot be loaded
    /// or rows cannot be inserted.
    #[instrument(skip(self, event), fields(kind = %event.kind(), actor = %event.actor()))]
    pub async fn publish(
        &self,
        event: NotificationEvent,
    ) -> Result<Vec<Notification>, NotificationError> {
        let users = UserRepository::new(&self.pool);
        let kind = event.kind();
        let actor = event.actor();

        let recipients: Vec<Recipient> = match &event {
            NotificationEvent::ProductAdded { .. } | NotificationEvent::ProductRemoved { .. } => {
                users.recipients_except(actor).await?
            }
            NotificationEvent::OrderPlaced { product_owner, .. } => match product_owner {
                Some(owner) if *owner != actor => users.recipient(*owner).await?.into_iter().collect(),
                _ => Vec::new(),
            },
        };

        if recipients.is_empty() {
            tracing::debug!("No recipients");
            return Ok(Vec::new());
        }

        let content = content_for(&event);
        let ids: Vec<UserId> = recipients.iter().map(|r| r.id).collect();
        let rows = NotificationRepository::new(&self.pool)
            .insert_for_recipients(&ids, &content)
            .await?;

        self.hub.publish_rows(
            Table::Notifications,
            ChangeKind::Insert,
            rows.iter()
                .map(|row| ChangeRow {
                    user_id: Some(row.user_id),
                    record: serde_json::to_value(row).unwrap_or_default(),
                })
                .collect(),
        );

        let push_targets: Vec<UserId> = recipients
            .iter()
            .filter(|r| r.preferences().is_enabled(kind))
            .map(|r| r.id)
            .collect();

        if let Some(first) = rows.first() {
            let data = json!({
                "type": kind,
                "productId": content.product_id,
                "notificationId": first.id,
            });
            self.dispatch_push(push_targets, kind.title().to_owned(), first.body(), data);
        }

        tracing::info!(recipients = rows.len(), "Notification published");
        Ok(rows)
    }

    /// Send a push in the background. Failures are logged.
    fn dispatch_push(
        &self,
        user_ids: Vec<UserId>,
        title: String,
        body: String,
        data: serde_json::Value,
    ) {
        if user_ids.is_empty() {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            match service.send_to_users(&user_ids, &title, &body, data).await {
                Ok(outcome) => {
                    tracing::debug!(devices = outcome.devices_notified, "Push dispatched");
                }
                Err(e) => tracing::warn!(error = %e, "Push dispatch failed"),
            }
        });
    }

    /// Push a message to every registered device of `user_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if device lookup or the gateway call fails.
    #[instrument(skip(self, title, body, data), fields(users = user_ids.len()))]
    pub async fn send_to_users(
        &self,
        user_ids: &[UserId],
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<PushOutcome, NotificationError> {
        let tokens = DeviceRepository::new(&self.pool).tokens_for(user_ids).await?;

        if tokens.is_empty() {
            return Ok(PushOutcome {
                success: true,
                devices_notified: 0,
                result: None,
                message: Some("No devices to notify"),
            });
        }

        let messages = messages_for(tokens, title, body, &data);
        let result = self.push.send(&messages).await?;

        Ok(PushOutcome {
            success: true,
            devices_notified: messages.len(),
            result: Some(result),
            message: None,
        })
    }

    /// Realtime stream of new notifications for one user.
    pub fn subscribe(&self, user_id: UserId) -> impl Stream<Item = Delivery> + Send + use<> {
        self.hub.subscribe(
            ChangeFilter::table(Table::Notifications)
                .kind(ChangeKind::Insert)
                .user(user_id),
        )
    }

    // =========================================================================
    // Read tracking
    // =========================================================================

    /// The user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let rows = NotificationRepository::new(&self.pool)
            .list(user_id, clamp_limit(limit))
            .await?;
        Ok(rows)
    }

    /// Mark one notification read and return the refreshed list.
    ///
    /// Marking an already-read notification changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::NotFound` if the notification is not the user's.
    #[instrument(skip(self), fields(user_id = %user_id, notification_id = %id))]
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Vec<Notification>, NotificationError> {
        let found = NotificationRepository::new(&self.pool)
            .mark_read(user_id, id)
            .await?;
        if !found {
            return Err(NotificationError::NotFound);
        }
        self.list(user_id, None).await
    }

    /// Mark all of the user's notifications read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the update fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, NotificationError> {
        Ok(NotificationRepository::new(&self.pool)
            .mark_all_read(user_id)
            .await?)
    }

    /// Delete all of the user's notifications. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the delete fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_all(&self, user_id: UserId) -> Result<u64, NotificationError> {
        Ok(NotificationRepository::new(&self.pool)
            .clear_all(user_id)
            .await?)
    }

    /// Unread notifications of the kinds the user has enabled.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if a query fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, NotificationError> {
        let preferences = self.preferences(user_id).await?;
        if preferences.all_disabled() {
            return Ok(0);
        }
        Ok(NotificationRepository::new(&self.pool)
            .unread_count(user_id, &preferences.enabled_kinds())
            .await?)
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    /// The user's preferences, with unset kinds enabled.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the user is missing or the query fails.
    pub async fn preferences(
        &self,
        user_id: UserId,
    ) -> Result<NotificationPreferences, NotificationError> {
        Ok(UserRepository::new(&self.pool)
            .get_preferences(user_id)
            .await?)
    }

    /// Store the user's preferences.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the user is missing or the update fails.
    pub async fn save_preferences(
        &self,
        user_id: UserId,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, NotificationError> {
        Ok(UserRepository::new(&self.pool)
            .save_preferences(user_id, preferences)
            .await?)
    }

    /// Restore the default preferences (everything enabled).
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the user is missing or the update fails.
    pub async fn reset_preferences(
        &self,
        user_id: UserId,
    ) -> Result<NotificationPreferences, NotificationError> {
        self.save_preferences(user_id, NotificationPreferences::default())
            .await
    }
}

/// Row content shared by every recipient of an event.
fn content_for(event: &NotificationEvent) -> NotificationContent {
    let kind = event.kind();
    match event {
        NotificationEvent::ProductAdded { product, actor }
        | NotificationEvent::ProductRemoved { product, actor } => NotificationContent {
            kind,
            product_id: Some(product.id),
            product_title: product.title.clone(),
            product_image: product.image.clone(),
            customer_name: None,
            created_by_user: Some(*actor),
        },
        NotificationEvent::OrderPlaced {
            order,
            product_image,
            ..
        } => NotificationContent {
            kind,
            product_id: Some(order.product_id),
            product_title: order.product_title.clone(),
            product_image: product_image.clone(),
            customer_name: Some(order.customer_name.clone()),
            created_by_user: Some(order.customer_id),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use freshbites_core::{
        CheckoutId, NotificationKind, OrderId, OrderStatus, Price, ProductId,
    };

    use super::*;
    use crate::models::{Order, Product};

    fn product() -> Product {
        Product {
            id: ProductId::random(),
            sku: "fb-beef-tehari".to_owned(),
            title: "Beef Tehari".to_owned(),
            description: String::new(),
            price: Price::new(Decimal::from(220)).unwrap(),
            image: Some("https://cdn.freshbites.app/tehari.jpg".to_owned()),
            is_premium: false,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 100);
        assert_eq!(clamp_limit(Some(20)), 20);
    }

    #[test]
    fn test_product_event_content_records_actor() {
        let actor = UserId::random();
        let p = product();
        let content = content_for(&NotificationEvent::ProductRemoved {
            product: p.clone(),
            actor,
        });

        assert_eq!(content.kind, NotificationKind::ProductRemoved);
        assert_eq!(content.product_id, Some(p.id));
        assert_eq!(content.created_by_user, Some(actor));
        assert_eq!(content.customer_name, None);
    }

    #[test]
    fn test_order_event_content_names_customer() {
        let customer = UserId::random();
        let order = Order {
            id: OrderId::random(),
            checkout_id: CheckoutId::random(),
            product_id: ProductId::random(),
            product_title: "Kacchi Biryani".to_owned(),
            product_price: Decimal::from(350),
            customer_id: customer,
            customer_name: "Rahim".to_owned(),
            quantity: 2,
            total_amount: Decimal::from(700),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        let event = NotificationEvent::OrderPlaced {
            order,
            product_image: None,
            product_owner: Some(UserId::random()),
        };

        assert_eq!(event.actor(), customer);
        let content = content_for(&event);
        assert_eq!(content.customer_name.as_deref(), Some("Rahim"));
        assert_eq!(content.created_by_user, Some(customer));
    }

    #[test]
    fn test_no_devices_outcome_shape() {
        let outcome = PushOutcome {
            success: true,
            devices_notified: 0,
            result: None,
            message: Some("No devices to notify"),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "success": true, "devicesNotified": 0, "message": "No devices to notify" })
        );
    }
}
