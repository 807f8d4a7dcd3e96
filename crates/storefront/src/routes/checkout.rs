//! Checkout and order history.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use freshbites_core::{Cart, CheckoutId};

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::{RequireAuth, RequireManager};
use crate::models::order::Order;
use crate::routes::cart::{load_cart, save_cart};
use crate::services::checkout::{CheckoutReceipt, CheckoutService};
use crate::services::payment::PaymentDetails;
use crate::state::AppState;

/// `/api/checkout`
pub fn checkout_router() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// `/api/orders`
pub fn orders_router() -> Router<AppState> {
    Router::new()
        .route("/", get(my_orders))
        .route("/manager", get(manager_orders))
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Client-generated; resubmitting the same id never charges twice.
    pub checkout_id: CheckoutId,
    pub payment: PaymentDetails,
}

/// `POST /api/checkout`
///
/// `201` with the receipt for a new checkout, `200` when an earlier
/// submission with the same `checkoutId` is replayed.
async fn checkout(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    let cart = load_cart(&session).await;

    let receipt = CheckoutService::new(state.pool(), state.payments(), state.notifications())
        .place_order(&user, &cart, &request.payment, request.checkout_id)
        .await?;

    save_cart(&session, &Cart::new()).await?;

    let status = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(receipt)))
}

/// `GET /api/orders`
async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_customer(user.id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/manager`
///
/// Orders for products the manager created.
async fn manager_orders(
    State(state): State<AppState>,
    RequireManager(manager): RequireManager,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_manager(manager.id)
        .await?;
    Ok(Json(orders))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::services::payment::PaymentMethod;

    use super::*;

    #[test]
    fn test_checkout_request_shape() {
        let id = CheckoutId::random();
        let request: CheckoutRequest = serde_json::from_str(&format!(
            r#"{{"checkoutId":"{id}","payment":{{"method":"bkash","phone":"01712345678"}}}}"#
        ))
        .unwrap();

        assert_eq!(request.checkout_id, id);
        assert_eq!(request.payment.method, PaymentMethod::Bkash);
        assert!(request.payment.validate().is_ok());
    }
}
