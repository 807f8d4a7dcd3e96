//! Notification route handlers.
//!
//! ```text
//! GET    /api/notifications               - list (?limit=, default 50, max 100)
//! DELETE /api/notifications               - delete all
//! GET    /api/notifications/unread-count  - unread, filtered by preferences
//! POST   /api/notifications/read-all      - mark all read
//! POST   /api/notifications/{id}/read     - mark one read, returns the list
//! GET    /api/notifications/stream        - SSE: `notification` and `resync`
//! GET    /api/notifications/preferences   - get
//! PUT    /api/notifications/preferences   - save
//! DELETE /api/notifications/preferences   - reset to defaults
//! ```

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use freshbites_core::{NotificationId, NotificationPreferences};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::notification::{Notification, NotificationAlert};
use crate::services::realtime::Delivery;
use crate::state::AppState;

/// Build the notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).delete(clear_all))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/stream", get(stream))
        .route(
            "/preferences",
            get(preferences).put(save_preferences).delete(reset_preferences),
        )
        .route("/{id}/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>> {
    let rows = state.notifications().list(user.id, query.limit).await?;
    Ok(Json(rows))
}

async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<NotificationId>,
) -> Result<Json<Vec<Notification>>> {
    let rows = state.notifications().mark_read(user.id, id).await?;
    Ok(Json(rows))
}

async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AffectedResponse>> {
    let affected = state.notifications().mark_all_read(user.id).await?;
    Ok(Json(AffectedResponse { affected }))
}

async fn clear_all(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AffectedResponse>> {
    let affected = state.notifications().clear_all(user.id).await?;
    Ok(Json(AffectedResponse { affected }))
}

async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CountResponse>> {
    let count = state.notifications().unread_count(user.id).await?;
    Ok(Json(CountResponse { count }))
}

async fn preferences(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<NotificationPreferences>> {
    Ok(Json(state.notifications().preferences(user.id).await?))
}

async fn save_preferences(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(preferences): Json<NotificationPreferences>,
) -> Result<Json<NotificationPreferences>> {
    Ok(Json(
        state
            .notifications()
            .save_preferences(user.id, preferences)
            .await?,
    ))
}

async fn reset_preferences(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<NotificationPreferences>> {
    Ok(Json(state.notifications().reset_preferences(user.id).await?))
}

/// SSE event for one delivery. Rows that cannot be decoded are skipped.
fn to_event(delivery: Delivery) -> Option<Event> {
    match delivery {
        Delivery::Change(change) => {
            let notification: Notification = match serde_json::from_value(change.record) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable notification");
                    return None;
                }
            };
            let alert = NotificationAlert::from(notification);
            let data = serde_json::to_string(&alert).ok()?;
            Some(Event::default().event("notification").data(data))
        }
        Delivery::Lagged(missed) => Some(Event::default().event("resync").data(missed.to_string())),
    }
}

/// `GET /api/notifications/stream`
async fn stream(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let events = state
        .notifications()
        .subscribe(user.id)
        .filter_map(|delivery| async move { to_event(delivery).map(Ok) });

    Sse::new(events).keep_alive(KeepAlive::default())
}
