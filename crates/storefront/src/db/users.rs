//! User repository for database operations.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`); row values are
//! re-validated through the core newtypes on the way out.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use freshbites_core::{Email, NotificationPreferences, UserId, UserRole, Username};

use super::{RepositoryError, conflict_on_unique};
use crate::models::user::User;

const USER_COLUMNS: &str = "id, username, email, name, phone, address, role, is_premium, \
                            notification_preferences, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    name: String,
    phone: Option<String>,
    address: Option<String>,
    role: UserRole,
    is_premium: bool,
    notification_preferences: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            username,
            email,
            name: row.name,
            phone: row.phone,
            address: row.address,
            role: row.role,
            is_premium: row.is_premium,
            notification_preferences: NotificationPreferences::from_json(
                &row.notification_preferences,
            ),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHash {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// A user who may receive notifications, with their stored preferences.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Recipient {
    pub id: UserId,
    notification_preferences: serde_json::Value,
}

impl Recipient {
    #[must_use]
    pub fn preferences(&self) -> NotificationPreferences {
        NotificationPreferences::from_json(&self.notification_preferences)
    }
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
}

/// Validated profile changes. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Check whether a (lowercased) username is taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn username_exists(&self, username: &Username) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username.as_str())
                .fetch_one(self.pool)
                .await?;

        Ok(exists)
    }

    /// Create a new user with a password.
    ///
    /// New accounts start with role `normal`, not premium, default preferences.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO users (username, email, name, phone, password_hash, notification_preferences)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new_user.username.as_str())
        .bind(new_user.email.as_str())
        .bind(&new_user.name)
        .bind(new_user.phone.as_deref())
        .bind(password_hash)
        .bind(Json(NotificationPreferences::default()))
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("username already exists"))?;

        User::try_from(row)
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHash> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Update profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_profile(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_ref().map(Email::as_str))
        .bind(changes.phone.as_deref())
        .bind(changes.address.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
            .and_then(User::try_from)
    }

    /// Set a user's role. The premium flag is written in the same statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users SET role = $2, is_premium = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(role)
        .bind(role.grants_premium())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
            .and_then(User::try_from)
    }

    /// Load a user's notification preferences, merged over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_preferences(
        &self,
        id: UserId,
    ) -> Result<NotificationPreferences, RepositoryError> {
        let value: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT notification_preferences FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        value
            .map(|v| NotificationPreferences::from_json(&v))
            .ok_or(RepositoryError::NotFound)
    }

    /// Store a user's notification preferences.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_preferences(
        &self,
        id: UserId,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET notification_preferences = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(preferences))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(preferences)
    }

    /// Every user except `actor`, with their preferences.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recipients_except(&self, actor: UserId) -> Result<Vec<Recipient>, RepositoryError> {
        let rows = sqlx::query_as(
            "SELECT id, notification_preferences FROM users WHERE id <> $1 ORDER BY created_at",
        )
        .bind(actor)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// A single recipient by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recipient(&self, id: UserId) -> Result<Option<Recipient>, RepositoryError> {
        let row = sqlx::query_as("SELECT id, notification_preferences FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }
}
