//! Cart route handlers.
//!
//! The cart is stored in the session. Every handler answers with the whole
//! cart and its totals so the client never recomputes prices.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use freshbites_core::{Cart, CartLine, CartTotals, MAX_LINE_QUANTITY, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::session::{CurrentUser, keys};
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).delete(clear))
        .route("/items", post(add))
        .route("/items/{product_id}", patch(update).delete(remove))
}

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub totals: CartTotals,
}

impl CartResponse {
    fn new(cart: Cart, user: &CurrentUser) -> Self {
        let totals = cart.totals(user.is_premium);
        Self {
            items: cart.lines().to_vec(),
            totals,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i64,
}

/// Reject quantities a single line cannot hold.
fn check_quantity(quantity: i64) -> Result<()> {
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(AppError::BadRequest(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

// =============================================================================
// Session Helpers
// =============================================================================

/// The session cart, or an empty one.
pub async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(keys::CART, cart).await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/cart`
async fn show(session: Session, RequireAuth(user): RequireAuth) -> Json<CartResponse> {
    Json(CartResponse::new(load_cart(&session).await, &user))
}

/// `POST /api/cart/items`
#[instrument(skip(state, session, user, body), fields(product_id = %body.product_id))]
async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddToCart>,
) -> Result<Json<CartResponse>> {
    check_quantity(i64::from(body.quantity))?;
    let product = state
        .catalog()
        .get_item(body.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    if product.is_premium && !user.is_premium {
        return Err(AppError::Forbidden("Premium access required".to_owned()));
    }

    let mut cart = load_cart(&session).await;
    cart.add(CartLine {
        product_id: product.id,
        sku: product.sku,
        title: product.title,
        image: product.image,
        price: product.price,
        is_premium: product.is_premium,
        quantity: body.quantity,
    });
    save_cart(&session, &cart).await?;

    Ok(Json(CartResponse::new(cart, &user)))
}

/// `PATCH /api/cart/items/{product_id}`
async fn update(
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateQuantity>,
) -> Result<Json<CartResponse>> {
    check_quantity(body.quantity)?;
    let mut cart = load_cart(&session).await;
    if !cart.set_quantity(product_id, body.quantity) {
        return Err(AppError::NotFound("Item not in cart".to_owned()));
    }
    save_cart(&session, &cart).await?;

    Ok(Json(CartResponse::new(cart, &user)))
}

/// `DELETE /api/cart/items/{product_id}`
async fn remove(
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse>> {
    let mut cart = load_cart(&session).await;
    if !cart.remove(product_id) {
        return Err(AppError::NotFound("Item not in cart".to_owned()));
    }
    save_cart(&session, &cart).await?;

    Ok(Json(CartResponse::new(cart, &user)))
}

/// `DELETE /api/cart`
async fn clear(session: Session, RequireAuth(user): RequireAuth) -> Result<Json<CartResponse>> {
    let cart = Cart::new();
    save_cart(&session, &cart).await?;
    Ok(Json(CartResponse::new(cart, &user)))
}
