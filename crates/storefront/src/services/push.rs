//! Push gateway client.
//!
//! Sends batched messages to an Expo-compatible push endpoint. Delivery is
//! best effort: no retries, and callers on the notification path log and
//! drop failures.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::PushConfig;

/// Errors that can occur when talking to the push gateway.
#[derive(Debug, Error)]
pub enum PushError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// One message for one device.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub to: String,
    pub sound: &'static str,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub channel_id: &'static str,
}

impl PushMessage {
    /// A message with the default sound and channel.
    #[must_use]
    pub fn new(to: String, title: &str, body: &str, data: serde_json::Value) -> Self {
        Self {
            to,
            sound: "default",
            title: title.to_owned(),
            body: body.to_owned(),
            data,
            channel_id: "default",
        }
    }
}

/// Build one message per token with the same content.
#[must_use]
pub fn messages_for(
    tokens: Vec<String>,
    title: &str,
    body: &str,
    data: &serde_json::Value,
) -> Vec<PushMessage> {
    tokens
        .into_iter()
        .map(|to| PushMessage::new(to, title, body, data.clone()))
        .collect()
}

/// Push gateway client.
#[derive(Clone)]
pub struct PushClient {
    client: reqwest::Client,
    gateway_url: String,
}

impl std::fmt::Debug for PushClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushClient")
            .field("gateway_url", &self.gateway_url)
            .finish_non_exhaustive()
    }
}

impl PushClient {
    /// Create a new push client.
    ///
    /// # Errors
    ///
    /// Returns error if the access token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &PushConfig) -> Result<Self, PushError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| PushError::Config(format!("Invalid access token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            gateway_url: config.gateway_url.clone(),
        })
    }

    /// Send a batch of messages. Returns the gateway's JSON response.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway responds with a
    /// non-success status.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub async fn send(&self, messages: &[PushMessage]) -> Result<serde_json::Value, PushError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PushError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json().await?;
        tracing::debug!("Push batch accepted");
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let message = PushMessage::new(
            "ExponentPushToken[abc]".to_owned(),
            "New Product Added!",
            "Beef Tehari is now available",
            json!({ "productId": "p1" }),
        );

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "to": "ExponentPushToken[abc]",
                "sound": "default",
                "title": "New Product Added!",
                "body": "Beef Tehari is now available",
                "data": { "productId": "p1" },
                "channelId": "default"
            })
        );
    }

    #[test]
    fn test_messages_for_fans_out_per_token() {
        let messages = messages_for(
            vec!["a".to_owned(), "b".to_owned()],
            "t",
            "b",
            &json!(null),
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].to, "b");
    }

    #[test]
    fn test_client_builds_with_token_and_debug_hides_it() {
        let config = PushConfig {
            gateway_url: "https://push.example.test/send".to_owned(),
            access_token: Some(secrecy::SecretString::from("tok_very_private")),
        };
        let client = PushClient::new(&config).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("push.example.test"));
        assert!(!debug.contains("tok_very_private"));
    }
}
