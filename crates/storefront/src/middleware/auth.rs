//! Authentication extractors.
//!
//! The logged-in user is kept in the session as a [`CurrentUser`]. Each
//! extractor reloads that user from the database, so a role change or a
//! deleted account takes effect on the next request. Handlers pick the
//! extractor matching the access they need.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::models::session::{CurrentUser, keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a manager.
pub struct RequireManager(pub CurrentUser);

/// Extractor that requires premium access (premium or manager role).
pub struct RequirePremium(pub CurrentUser);

/// Why an extractor refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Not logged in.
    Unauthorized,
    /// Logged in without the required role.
    Forbidden(&'static str),
    /// The user could not be reloaded.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response(),
            Self::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            Self::Unavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

/// The session user, reloaded from the database.
///
/// A deleted account is logged out. A changed role or premium flag is
/// written back to the session.
async fn current_user(
    parts: &Parts,
    state: &AppState,
) -> Result<Option<CurrentUser>, AuthRejection> {
    // Set by SessionManagerLayer
    let Some(session) = parts.extensions.get::<Session>() else {
        return Ok(None);
    };
    let Some(cached) = session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
    else {
        return Ok(None);
    };

    let user = UserRepository::new(state.pool())
        .get_by_id(cached.id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %cached.id, "Failed to reload session user");
            AuthRejection::Unavailable
        })?;

    let Some(user) = user else {
        tracing::info!(user_id = %cached.id, "Session user no longer exists");
        if let Err(e) = clear_current_user(session).await {
            tracing::warn!(error = %e, "Failed to clear stale session user");
        }
        return Ok(None);
    };

    let fresh = CurrentUser::from(&user);
    if fresh != cached {
        tracing::debug!(user_id = %fresh.id, role = ?fresh.role, "Refreshing session user");
        if let Err(e) = set_current_user(session, &fresh).await {
            tracing::warn!(error = %e, "Failed to refresh session user");
        }
    }
    Ok(Some(fresh))
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_user(parts, state)
            .await?
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

impl FromRequestParts<AppState> for RequireManager {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = current_user(parts, state)
            .await?
            .ok_or(AuthRejection::Unauthorized)?;
        if !user.role.is_manager() {
            return Err(AuthRejection::Forbidden("Manager access required"));
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequirePremium {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = current_user(parts, state)
            .await?
            .ok_or(AuthRejection::Unauthorized)?;
        if !user.is_premium {
            return Err(AuthRejection::Forbidden("Premium access required"));
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is logged
/// in. A failed reload is treated as anonymous.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts, state).await.ok().flatten()))
    }
}

/// Store the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_USER, user).await
}

/// Remove the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
    Ok(())
}
