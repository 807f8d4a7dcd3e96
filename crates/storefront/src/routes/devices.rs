//! Push device registration.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use serde::Deserialize;

use freshbites_core::Platform;

use crate::db::DeviceRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the devices router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/{device_id}", delete(unregister))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub device_id: String,
    pub push_token: String,
    pub platform: Platform,
}

/// `POST /api/devices`
///
/// Binds the device to the caller, replacing any earlier owner or token.
async fn register(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<DeviceRegistration>,
) -> Result<StatusCode> {
    let device_id = body.device_id.trim();
    let push_token = body.push_token.trim();
    if device_id.is_empty() || push_token.is_empty() {
        return Err(AppError::BadRequest(
            "deviceId and pushToken are required".to_owned(),
        ));
    }

    DeviceRepository::new(state.pool())
        .upsert(device_id, user.id, push_token, body.platform)
        .await?;

    tracing::debug!(user_id = %user.id, platform = body.platform.as_str(), "Device registered");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/devices/{device_id}`
async fn unregister(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(device_id): Path<String>,
) -> Result<StatusCode> {
    let removed = DeviceRepository::new(state.pool())
        .delete(&device_id, user.id)
        .await?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Device not found".to_owned()))
    }
}
