//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login and registration (~10/min per client)
//! - `api_rate_limiter`: push fan-out and other expensive endpoints (~100/min)

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Headers that carry the client address behind a proxy, in priority order.
/// `x-forwarded-for` may hold a chain; the first entry is the client.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Key extractor that reads the client IP from proxy headers.
#[derive(Clone, Copy)]
pub struct ProxyIpKeyExtractor;

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

impl tower_governor::key_extractor::KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req.headers()).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_seconds: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(replenish_seconds)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Rate limiter for auth endpoints: one token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Never in practice: both parameters are non-zero constants.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5).expect("auth rate limiter parameters are non-zero")
}

/// Rate limiter for general API endpoints: one token per second, burst of 50.
///
/// # Panics
///
/// Never in practice: both parameters are non-zero constants.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(1, 50).expect("api rate limiter parameters are non-zero")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.7".parse().unwrap()));

        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers), Some("198.51.100.2".parse().unwrap()));
    }

    #[test]
    fn test_no_headers_no_key() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_limiters_build() {
        let _ = auth_rate_limiter();
        let _ = api_rate_limiter();
    }
}
