//! Product route handlers.
//!
//! Anyone can browse the regular menu. The premium menu needs premium access
//! and every write needs a manager.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use freshbites_core::ProductId;

use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireManager, RequirePremium};
use crate::models::product::{ProductCategory, ProductInput, ProductView};
use crate::services::catalog::CatalogExport;
use crate::state::AppState;

/// Build the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/premium", get(premium))
        .route("/export", get(export))
        .route("/refresh", post(refresh))
        .route("/actions", get(actions))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// Body of create and update requests.
#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    #[serde(default = "regular_menu")]
    pub category: ProductCategory,
    pub item: ProductInput,
}

const fn regular_menu() -> ProductCategory {
    ProductCategory::Products
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub changed: bool,
}

/// `GET /api/products`
async fn index(State(state): State<AppState>) -> Json<Vec<ProductView>> {
    let products = state.catalog().get_products().await;
    Json(products.iter().map(ProductView::from).collect())
}

/// `GET /api/products/premium`
async fn premium(
    State(state): State<AppState>,
    RequirePremium(_user): RequirePremium,
) -> Json<Vec<ProductView>> {
    let products = state.catalog().get_premium_items().await;
    Json(products.iter().map(ProductView::from).collect())
}

/// `GET /api/products/{id}`
async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductView>> {
    let product = state
        .catalog()
        .get_item(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    if product.is_premium && !user.is_some_and(|u| u.is_premium) {
        return Err(AppError::Forbidden("Premium access required".to_owned()));
    }

    Ok(Json(ProductView::from(&product)))
}

/// `GET /api/products/export`
async fn export(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> Json<CatalogExport> {
    Json(state.catalog().export().await)
}

/// `POST /api/products`
async fn create(
    State(state): State<AppState>,
    RequireManager(manager): RequireManager,
    Json(payload): Json<ProductPayload>,
) -> Result<(StatusCode, Json<ProductView>)> {
    let product = state
        .catalog()
        .add_item(payload.item, payload.category.is_premium(), manager.id)
        .await?;
    Ok((StatusCode::CREATED, Json(ProductView::from(&product))))
}

/// `PUT /api/products/{id}`
async fn update(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
    Path(id): Path<ProductId>,
    Json(payload): Json<ProductPayload>,
) -> Result<Json<ProductView>> {
    let product = state
        .catalog()
        .update_item(id, payload.item, payload.category.is_premium())
        .await?;
    Ok(Json(ProductView::from(&product)))
}

/// `DELETE /api/products/{id}`
async fn remove(
    State(state): State<AppState>,
    RequireManager(manager): RequireManager,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductView>> {
    let product = state.catalog().delete_item(id, manager.id).await?;
    Ok(Json(ProductView::from(&product)))
}

/// `POST /api/products/refresh`
async fn refresh(
    State(state): State<AppState>,
    RequireManager(_manager): RequireManager,
) -> Json<RefreshResponse> {
    Json(RefreshResponse {
        changed: state.catalog().refresh().await,
    })
}

/// `GET /api/products/actions`
///
/// Streams `action` events as the catalog changes. A `resync` event means
/// actions were dropped and the client should re-fetch both menus.
async fn actions(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut rx = state.catalog().subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(action) => {
                    let data = serde_json::to_string(&action).unwrap_or_default();
                    yield Ok(Event::default().event("action").data(data));
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Catalog action subscriber lagged");
                    yield Ok(Event::default().event("resync").data(missed.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
