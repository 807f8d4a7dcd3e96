//! Push device registrations.

use sqlx::PgPool;

use freshbites_core::{Platform, UserId};

use super::RepositoryError;

/// Repository for `user_devices`.
pub struct DeviceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DeviceRepository<'a> {
    /// Create a new device repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Register a device, or move an existing device to this user and token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        device_id: &str,
        user_id: UserId,
        push_token: &str,
        platform: Platform,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO user_devices (device_id, user_id, push_token, platform, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                push_token = EXCLUDED.push_token,
                platform = EXCLUDED.platform,
                updated_at = NOW()
            ",
        )
        .bind(device_id)
        .bind(user_id)
        .bind(push_token)
        .bind(platform.as_str())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a device registered to this user. Returns `false` if none matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, device_id: &str, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_devices WHERE device_id = $1 AND user_id = $2")
            .bind(device_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Push tokens registered by any of `user_ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tokens_for(&self, user_ids: &[UserId]) -> Result<Vec<String>, RepositoryError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<uuid::Uuid> = user_ids.iter().map(UserId::as_uuid).collect();

        let tokens = sqlx::query_scalar(
            r"
            SELECT DISTINCT push_token FROM user_devices
            WHERE user_id = ANY($1) AND push_token <> ''
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(tokens)
    }
}
