//! Authentication route handlers.
//!
//! Username/password accounts. A successful register or login stores the
//! user in the session.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::session::CurrentUser;
use crate::models::user::User;
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Query for `GET /api/auth/username-available`.
#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub available: bool,
}

/// Put `user` in a fresh session.
async fn start_session(session: &Session, user: &User) -> Result<()> {
    session.cycle_id().await?;
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.username.as_str()));
    Ok(())
}

/// Register a new account and log it in.
#[instrument(skip(state, session, registration), fields(username = %registration.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(registration)
        .await?;

    start_session(&session, &user).await?;
    add_breadcrumb("auth", "Registered", None);

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with username and password.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&form.username, &form.password)
        .await?;

    start_session(&session, &user).await?;
    add_breadcrumb("auth", "Logged in", None);
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(user))
}

/// Log out and destroy the session.
pub async fn logout(session: Session) -> StatusCode {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
    }
    clear_sentry_user();

    StatusCode::NO_CONTENT
}

/// The logged-in user's account.
pub async fn me(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let Some(user) = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
    else {
        // Account deleted while the session was alive
        clear_current_user(&session).await?;
        return Err(AppError::Unauthorized("Authentication required".to_owned()));
    };

    Ok(Json(user))
}

/// Whether a username can still be registered.
pub async fn username_available(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Availability>> {
    let available = AuthService::new(state.pool())
        .username_available(&query.username)
        .await?;
    Ok(Json(Availability { available }))
}
