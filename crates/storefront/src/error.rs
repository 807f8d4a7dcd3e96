//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error response is JSON: `{ "error": "..." }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::notifications::NotificationError;
use crate::services::payment::PaymentError;

const INTERNAL: &str = "Internal server error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Notification operation failed.
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Payment failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and the message safe to show the client.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
            }
            Self::Auth(err) => auth_response(err),
            Self::Catalog(err) => match err {
                CatalogError::NotFound => (StatusCode::NOT_FOUND, "Product not found".to_owned()),
                CatalogError::InvalidProduct(e) => (StatusCode::BAD_REQUEST, e.to_string()),
                CatalogError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, err.to_string()),
                CheckoutError::ProductUnavailable(_)
                | CheckoutError::InProgress
                | CheckoutError::CheckoutIdTaken => (StatusCode::CONFLICT, err.to_string()),
                CheckoutError::PremiumRequired(_) => (StatusCode::FORBIDDEN, err.to_string()),
                CheckoutError::QuantityTooLarge(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                CheckoutError::Payment(e) => payment_response(e),
                CheckoutError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
                }
            },
            Self::Notification(err) => match err {
                NotificationError::NotFound => {
                    (StatusCode::NOT_FOUND, "Notification not found".to_owned())
                }
                NotificationError::Repository(RepositoryError::NotFound) => {
                    (StatusCode::NOT_FOUND, "User not found".to_owned())
                }
                NotificationError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
                }
                NotificationError::Push(_) => {
                    (StatusCode::BAD_GATEWAY, "Push delivery failed".to_owned())
                }
            },
            Self::Payment(err) => payment_response(err),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_owned(),
            ),
        }
    }
}

fn auth_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::UserAlreadyExists => (StatusCode::CONFLICT, err.to_string()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_owned()),
        AuthError::InvalidUsername(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        AuthError::MissingName => (StatusCode::BAD_REQUEST, "Name is required".to_owned()),
        AuthError::Repository(_) | AuthError::PasswordHash => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
        }
    }
}

fn payment_response(err: &PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::InvalidDetails(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        PaymentError::Declined(_) => (StatusCode::PAYMENT_REQUIRED, err.to_string()),
        PaymentError::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Payment provider unavailable".to_owned(),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InProgress)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::CheckoutIdTaken)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::PremiumRequired(
                "Kacchi Biryani".to_string()
            ))),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::QuantityTooLarge(
                "Fuchka".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Notification(NotificationError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::Unavailable)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_bodies_are_json() {
        let body = body_of(AppError::Auth(AuthError::InvalidCredentials)).await;
        assert_eq!(body["error"], "Invalid username or password");

        let body = body_of(AppError::Checkout(CheckoutError::EmptyCart)).await;
        assert_eq!(body["error"], "Empty Cart");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_of(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
