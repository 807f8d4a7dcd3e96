//! Authentication service.
//!
//! Username and password accounts, hashed with Argon2id.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use freshbites_core::{Email, Username};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new account with role `normal`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername`, `AuthError::InvalidEmail`,
    /// `AuthError::MissingName` or `AuthError::WeakPassword` for bad input.
    /// Returns `AuthError::UserAlreadyExists` if the username is taken.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let username = Username::parse(&registration.username)?;
        let email = Email::parse(&registration.email)?;
        let name = registration.name.trim().to_owned();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        validate_password(&registration.password)?;

        if self.users.username_exists(&username).await? {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&registration.password)?;
        let new_user = NewUser {
            username,
            email,
            name,
            phone: registration
                .phone
                .map(|p| p.trim().to_owned())
                .filter(|p| !p.is_empty()),
        };

        let user = self
            .users
            .create(&new_user, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Log in with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username or password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = Username::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Whether `username` can still be registered.
    ///
    /// A malformed username is never available.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the query fails.
    pub async fn username_available(&self, username: &str) -> Result<bool, AuthError> {
        let Ok(username) = Username::parse(username) else {
            return Ok(false);
        };
        Ok(!self.users.username_exists(&username).await?)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Hash a password for accounts created outside registration (CLI).
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short, or
/// `AuthError::PasswordHash` if hashing fails.
pub fn hash_new_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;
    hash_password(password)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_registration_form_phone_is_optional() {
        let form: Registration = serde_json::from_str(
            r#"{"username":"Rahim","password":"secret123","email":"r@example.com","name":"Rahim"}"#,
        )
        .unwrap();
        assert!(form.phone.is_none());
    }
}
