//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//! GET  /api/config                      - Client configuration
//!
//! # Auth (rate limited)
//! POST /api/auth/register               - Create account, log in
//! POST /api/auth/login                  - Log in
//! POST /api/auth/logout                 - Log out
//! GET  /api/auth/me                     - Current account
//! GET  /api/auth/username-available     - ?username=
//!
//! # Products
//! GET  /api/products                    - Regular menu
//! GET  /api/products/premium            - Premium menu (premium)
//! GET  /api/products/export             - Both menus (manager)
//! POST /api/products/refresh            - Force refresh (manager)
//! GET  /api/products/actions            - SSE catalog actions
//! GET  /api/products/{id}               - One product
//! POST /api/products                    - Add (manager)
//! PUT  /api/products/{id}               - Update (manager)
//! DELETE /api/products/{id}             - Delete (manager)
//!
//! # Cart, checkout, orders
//! GET  /api/cart                        - Cart with totals
//! DELETE /api/cart                      - Empty the cart
//! POST /api/cart/items                  - Add a product
//! PATCH /api/cart/items/{product_id}    - Set quantity (<= 0 removes)
//! DELETE /api/cart/items/{product_id}   - Remove a product
//! POST /api/checkout                    - Pay and place orders
//! GET  /api/orders                      - My orders
//! GET  /api/orders/manager              - Orders for my products (manager)
//!
//! # Profile and devices
//! GET/PATCH /api/profile                - Profile
//! PUT  /api/profile/role                - Change role
//! POST /api/profile/premium             - Buy premium
//! POST /api/profile/premium/restore     - Restore premium
//! POST /api/devices                     - Register push device
//! DELETE /api/devices/{device_id}       - Unregister push device
//!
//! # Notifications
//! see [`notifications`]
//!
//! # Push
//! POST /api/push/send                   - Manual push (manager)
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod devices;
pub mod notifications;
pub mod products;
pub mod profile;
pub mod push;
pub mod system;

use axum::{
    Router,
    extract::Request,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/username-available", get(auth::username_available))
}

/// Create the `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/config", get(system::client_config))
        .nest("/auth", auth_routes())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/checkout", checkout::checkout_router())
        .nest("/orders", checkout::orders_router())
        .nest("/profile", profile::router())
        .nest("/devices", devices::router())
        .nest("/notifications", notifications::router())
        .nest("/push", push::router())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/health/ready", get(system::readiness))
        .nest("/api", api_routes())
}

/// The complete application: routes, sessions, request IDs and tracing.
///
/// Sentry layers are added by the binary.
pub fn app<Store>(state: AppState, sessions: SessionManagerLayer<Store>) -> Router
where
    Store: SessionStore + Clone,
{
    routes()
        .layer(sessions)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
