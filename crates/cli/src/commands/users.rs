//! Account management commands.
//!
//! The manager role can only be granted by another manager over HTTP, so the
//! first manager is created here.

use freshbites_core::{Email, Username, UserRole};
use freshbites_storefront::db::users::NewUser;
use freshbites_storefront::db::{RepositoryError, UserRepository};
use freshbites_storefront::services::auth::{AuthError, hash_new_password};

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("{0}. Valid roles: normal, premium, manager")]
    InvalidRole(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] freshbites_core::UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] freshbites_core::EmailError),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error(transparent)]
    Password(#[from] AuthError),

    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn parse_role(role: &str) -> Result<UserRole, UserError> {
    role.parse().map_err(UserError::InvalidRole)
}

/// Create an account and give it `role`.
pub async fn create(
    username: &str,
    email: &str,
    name: &str,
    role: &str,
    password: &str,
) -> Result<(), UserError> {
    let role = parse_role(role)?;
    let new_user = NewUser {
        username: Username::parse(username)?,
        email: Email::parse(email)?,
        name: name.trim().to_owned(),
        phone: None,
    };
    let hash = hash_new_password(password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = match users.create(&new_user, &hash).await {
        Ok(user) => user,
        Err(RepositoryError::Conflict(_)) => {
            return Err(UserError::UserExists(new_user.username.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let user = if role == UserRole::Normal {
        user
    } else {
        users.set_role(user.id, role).await?
    };

    tracing::info!(user_id = %user.id, username = %user.username, role = %role, "User created");
    Ok(())
}

/// Change the role of an existing account.
pub async fn set_role(username: &str, role: &str) -> Result<(), UserError> {
    let role = parse_role(role)?;
    let username = Username::parse(username)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_username(&username)
        .await?
        .ok_or_else(|| UserError::NotFound(username.to_string()))?;
    let user = users.set_role(user.id, role).await?;

    tracing::info!(
        user_id = %user.id,
        role = %role,
        is_premium = user.is_premium,
        "Role updated"
    );
    Ok(())
}
