//! Notification repository for database operations.
//!
//! Each notification row belongs to exactly one recipient and carries its
//! own read state.

use sqlx::PgPool;

use freshbites_core::{NotificationId, NotificationKind, ProductId, UserId};

use super::RepositoryError;
use crate::models::notification::Notification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, product_id, product_title, product_image, \
                                    customer_name, created_by_user, is_read, read_at, created_at";

/// Shared content of a notification fanned out to several recipients.
#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub kind: NotificationKind,
    pub product_id: Option<ProductId>,
    pub product_title: String,
    pub product_image: Option<String>,
    pub customer_name: Option<String>,
    pub created_by_user: Option<UserId>,
}

/// Repository for notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert one row per recipient.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_for_recipients(
        &self,
        recipients: &[UserId],
        content: &NotificationContent,
    ) -> Result<Vec<Notification>, RepositoryError> {
        if recipients.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<uuid::Uuid> = recipients.iter().map(UserId::as_uuid).collect();

        let rows = sqlx::query_as(&format!(
            r"
            INSERT INTO notifications
                (user_id, kind, product_id, product_title, product_image, customer_name, created_by_user)
            SELECT recipient, $2, $3, $4, $5, $6, $7
            FROM UNNEST($1::uuid[]) AS recipient
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(&ids)
        .bind(content.kind)
        .bind(content.product_id)
        .bind(&content.product_title)
        .bind(content.product_image.as_deref())
        .bind(content.customer_name.as_deref())
        .bind(content.created_by_user)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId, limit: i64) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            r"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Mark one of the user's notifications as read.
    ///
    /// `read_at` keeps the first read time. Returns `false` when no such
    /// notification belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW()), updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark all of the user's unread notifications as read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND NOT is_read
            ",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete all of the user's notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear_all(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count unread notifications of the given kinds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(
        &self,
        user_id: UserId,
        kinds: &[NotificationKind],
    ) -> Result<i64, RepositoryError> {
        if kinds.is_empty() {
            return Ok(0);
        }
        let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();

        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1 AND NOT is_read AND kind::text = ANY($2)
            ",
        )
        .bind(user_id)
        .bind(&kinds)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
