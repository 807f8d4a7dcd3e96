//! Manual push delivery.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use freshbites_core::UserId;

use crate::error::{AppError, Result};
use crate::middleware::{RequireManager, api_rate_limiter};
use crate::services::notifications::PushOutcome;
use crate::state::AppState;

/// Build the push router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .layer(api_rate_limiter())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPush {
    pub user_ids: Vec<UserId>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `POST /api/push/send`
///
/// Sends one alert to every registered device of `userIds`.
async fn send(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
    Json(request): Json<SendPush>,
) -> Result<Json<PushOutcome>> {
    if request.user_ids.is_empty() {
        return Err(AppError::BadRequest("userIds must not be empty".to_owned()));
    }

    let outcome = state
        .notifications()
        .send_to_users(&request.user_ids, &request.title, &request.body, request.data)
        .await?;
    Ok(Json(outcome))
}
