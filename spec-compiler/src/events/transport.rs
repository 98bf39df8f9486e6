//! Message bus transport.

use crate::utils::{redact_secrets, redacted_excerpt};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Status codes reported by the message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCode {
    /// The bus is temporarily unreachable.
    Unavailable,
    /// The call did not finish in time.
    DeadlineExceeded,
    /// The bus failed internally.
    Internal,
    /// Quota or rate limit hit.
    ResourceExhausted,
    /// The call was aborted, usually by contention.
    Aborted,
    /// The caller may not publish to the topic.
    PermissionDenied,
    /// The message was rejected as malformed.
    InvalidArgument,
    /// The topic does not exist.
    NotFound,
    /// Credentials are missing or invalid.
    Unauthenticated,
    /// Anything not covered above.
    Unknown,
}

impl TransportCode {
    /// Returns true for codes worth retrying.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::DeadlineExceeded
                | Self::Internal
                | Self::ResourceExhausted
                | Self::Aborted
        )
    }

    /// Maps an HTTP status onto a bus code.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Aborted,
            429 => Self::ResourceExhausted,
            500 => Self::Internal,
            502 | 503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unavailable => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Internal => "INTERNAL",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Aborted => "ABORTED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A failed publish attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct TransportError {
    /// Bus status code.
    pub code: TransportCode,
    /// Redacted detail.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    #[must_use]
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the attempt may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}

/// Publishes raw messages to a topic.
#[async_trait]
pub trait TopicTransport: Send + Sync {
    /// Publishes `data` to `topic_path` (`projects/{p}/topics/{t}`) and
    /// returns the bus-assigned message id.
    async fn publish(
        &self,
        topic_path: &str,
        data: &[u8],
        ordering_key: &str,
    ) -> Result<String, TransportError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes through the Pub/Sub REST API.
#[derive(Debug, Clone)]
pub struct PubSubRestTransport {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl PubSubRestTransport {
    /// Creates a transport for `endpoint` (e.g. `https://pubsub.googleapis.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }
}

#[async_trait]
impl TopicTransport for PubSubRestTransport {
    async fn publish(
        &self,
        topic_path: &str,
        data: &[u8],
        ordering_key: &str,
    ) -> Result<String, TransportError> {
        let url = format!("{}/v1/{topic_path}:publish", self.endpoint);
        let body = serde_json::json!({
            "messages": [{
                "data": STANDARD.encode(data),
                "orderingKey": ordering_key,
            }]
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            let code = if e.is_timeout() {
                TransportCode::DeadlineExceeded
            } else {
                TransportCode::Unavailable
            };
            TransportError::new(code, redact_secrets(&e.to_string()))
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::new(TransportCode::Unavailable, redact_secrets(&e.to_string())))?;

        if !status.is_success() {
            return Err(TransportError::new(
                TransportCode::from_http_status(status.as_u16()),
                redacted_excerpt(&text, 500),
            ));
        }

        let parsed: PublishResponse = serde_json::from_str(&text)
            .map_err(|e| TransportError::new(TransportCode::Unknown, format!("invalid publish response: {e}")))?;

        parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::new(TransportCode::Unknown, "publish response carried no message id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes() {
        for code in [
            TransportCode::Unavailable,
            TransportCode::DeadlineExceeded,
            TransportCode::Internal,
            TransportCode::ResourceExhausted,
            TransportCode::Aborted,
        ] {
            assert!(code.is_transient(), "{code} should be transient");
        }
        for code in [
            TransportCode::PermissionDenied,
            TransportCode::InvalidArgument,
            TransportCode::NotFound,
            TransportCode::Unauthenticated,
            TransportCode::Unknown,
        ] {
            assert!(!code.is_transient(), "{code} should be permanent");
        }
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(TransportCode::from_http_status(503), TransportCode::Unavailable);
        assert_eq!(TransportCode::from_http_status(429), TransportCode::ResourceExhausted);
        assert_eq!(TransportCode::from_http_status(403), TransportCode::PermissionDenied);
        assert_eq!(TransportCode::from_http_status(504), TransportCode::DeadlineExceeded);
        assert_eq!(TransportCode::from_http_status(418), TransportCode::Unknown);
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::new(TransportCode::NotFound, "topic missing");
        assert_eq!(err.to_string(), "NOT_FOUND: topic missing");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_publish_response_parsing() {
        let parsed: PublishResponse = serde_json::from_str(r#"{"messageIds":["42"]}"#).unwrap();
        assert_eq!(parsed.message_ids, vec!["42".to_string()]);
    }
}
