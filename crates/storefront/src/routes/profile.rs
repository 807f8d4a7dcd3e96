//! Profile, role and premium handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use freshbites_core::{Email, UserRole};

use crate::db::UserRepository;
use crate::db::users::ProfileChanges;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::session::CurrentUser;
use crate::models::user::{ProfileUpdate, User};
use crate::services::payment::{
    ChargeRequest, PREMIUM_PRICE, PREMIUM_SKU, PaymentMethod, PaymentReceipt,
};
use crate::state::AppState;

/// Build the profile router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).patch(update))
        .route("/role", put(change_role))
        .route("/premium", post(purchase_premium))
        .route("/premium/restore", post(restore_premium))
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: UserRole,
}

/// Result of a premium purchase.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumResponse {
    pub user: User,
    /// Absent when the account already had premium access.
    pub payment: Option<PaymentReceipt>,
}

async fn load_user(state: &AppState, current: &CurrentUser) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_owned()))
}

/// Keep the session copy of the user in step with the database.
async fn refresh_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    Ok(())
}

/// Validate a profile update.
fn profile_changes(update: ProfileUpdate) -> Result<ProfileChanges> {
    let name = match update.name.map(|n| n.trim().to_owned()) {
        Some(n) if n.is_empty() => {
            return Err(AppError::BadRequest("Name is required".to_owned()));
        }
        other => other,
    };
    let email = update
        .email
        .as_deref()
        .map(Email::parse)
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid email address".to_owned()))?;

    Ok(ProfileChanges {
        name,
        email,
        phone: update.phone.map(|p| p.trim().to_owned()),
        address: update.address.map(|a| a.trim().to_owned()),
    })
}

/// `GET /api/profile`
async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(load_user(&state, &current).await?))
}

/// `PATCH /api/profile`
#[instrument(skip_all, fields(user_id = %current.id))]
async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    let changes = profile_changes(body)?;
    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &changes)
        .await?;

    refresh_session(&session, &user).await?;
    Ok(Json(user))
}

/// `PUT /api/profile/role`
///
/// `normal` and `premium` are self-service; only a manager may keep or
/// grant the `manager` role.
#[instrument(skip_all, fields(user_id = %current.id, role = %body.role))]
async fn change_role(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(body): Json<RoleChange>,
) -> Result<Json<User>> {
    if !current.role.can_switch_to(body.role) {
        return Err(AppError::Forbidden(
            "Only managers can assign the manager role".to_owned(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .set_role(current.id, body.role)
        .await?;

    refresh_session(&session, &user).await?;
    add_breadcrumb("profile", "Role changed", Some(&[("role", body.role.as_str())]));
    tracing::info!("Role changed");
    Ok(Json(user))
}

/// `POST /api/profile/premium`
///
/// Charges the premium unlock as an in-app purchase, then sets the role to
/// `premium`. Accounts that already have premium access are not charged.
#[instrument(skip_all, fields(user_id = %current.id))]
async fn purchase_premium(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Json<PremiumResponse>> {
    let user = load_user(&state, &current).await?;
    if user.is_premium {
        return Ok(Json(PremiumResponse {
            user,
            payment: None,
        }));
    }

    let receipt = state
        .payments()
        .charge(&ChargeRequest {
            user_id: current.id,
            method: PaymentMethod::Iap,
            amount: PREMIUM_PRICE,
            sku: PREMIUM_SKU.to_owned(),
        })
        .await?;

    let user = UserRepository::new(state.pool())
        .set_role(current.id, UserRole::Premium)
        .await?;

    refresh_session(&session, &user).await?;
    tracing::info!(transaction_id = %receipt.transaction_id, "Premium unlocked");

    Ok(Json(PremiumResponse {
        user,
        payment: Some(receipt),
    }))
}

/// `POST /api/profile/premium/restore`
///
/// Succeeds only for accounts that already have premium access.
async fn restore_premium(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = load_user(&state, &current).await?;
    if !user.is_premium {
        return Err(AppError::NotFound(
            "No premium purchase to restore".to_owned(),
        ));
    }

    refresh_session(&session, &user).await?;
    Ok(Json(user))
}
