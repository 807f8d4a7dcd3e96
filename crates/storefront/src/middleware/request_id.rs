//! Request ID middleware for request tracing and correlation.
//!
//! An `x-request-id` from an upstream proxy is reused; otherwise a UUID v4 is
//! generated. The ID is recorded on the current span, tagged on the Sentry
//! scope, stored in request extensions and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest accepted upstream ID. Longer values are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// The request's ID, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn incoming_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(String::from)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = incoming_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn request_with(id: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(id) = id {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_upstream_id_is_reused() {
        assert_eq!(incoming_id(&request_with(Some(" abc-123 "))).unwrap(), "abc-123");
    }

    #[test]
    fn test_missing_or_oversized_id_is_ignored() {
        assert!(incoming_id(&request_with(None)).is_none());
        assert!(incoming_id(&request_with(Some(""))).is_none());
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(incoming_id(&request_with(Some(&long))).is_none());
    }
}
