//! Token minting.

use super::CachedCredential;
use crate::config::MintingConfig;
use crate::errors::{ErrorClass, FailureCategory};
use crate::utils::{parse_timestamp, redact_secrets, redacted_excerpt, Timestamp};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Longest collaborator response excerpt kept in an error.
const MAX_BODY_EXCERPT_CHARS: usize = 500;

/// Errors raised by a [`TokenMinter`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MintError {
    /// The minting service address is not configured.
    #[error("Minting service not configured: missing {0}")]
    NotConfigured(String),

    /// The minting service has no token for this repository.
    #[error("Minting service returned status 404")]
    NotFound,

    /// The minting service rejected the request.
    #[error("Minting service returned status {status}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Truncated, redacted response excerpt. Never shown to callers.
        body: Option<String>,
    },

    /// The minting service failed.
    #[error("Minting service returned status {status}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Truncated, redacted response excerpt. Never shown to callers.
        body: Option<String>,
    },

    /// The request timed out.
    #[error("Minting service request timed out")]
    Timeout,

    /// The request could not be delivered.
    #[error("HTTP error during token minting: {0}")]
    Transport(String),

    /// The response could not be interpreted.
    #[error("Malformed minting response: {0}")]
    MalformedResponse(String),
}

impl MintError {
    /// Classifies the error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotConfigured(_) => ErrorClass::Configuration,
            Self::NotFound | Self::Client { .. } => ErrorClass::UpstreamClient,
            Self::Server { .. } | Self::Timeout | Self::Transport(_) => ErrorClass::UpstreamServer,
            Self::MalformedResponse(_) => ErrorClass::Data,
        }
    }

    /// Outward category: 500 when unconfigured, 502 when the service
    /// rejected the request, 503 otherwise.
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::NotConfigured(_) => FailureCategory::Configuration,
            Self::NotFound | Self::Client { .. } => FailureCategory::BadGateway,
            _ => FailureCategory::ServiceUnavailable,
        }
    }

    /// Caller-safe summary.
    #[must_use]
    pub fn public_summary(&self) -> String {
        format!("Failed to mint GitHub token: {self}")
    }

    /// HTTP status reported by the service, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound => Some(404),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_status(status: u16, body: &str) -> Self {
        let body = Some(redacted_excerpt(body, MAX_BODY_EXCERPT_CHARS));
        match status {
            404 => Self::NotFound,
            400..=499 => Self::Client { status, body },
            _ => Self::Server { status, body },
        }
    }
}

/// Source of fresh repository credentials.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenMinter: Send + Sync {
    /// Mints a credential for `owner/repo`.
    async fn mint(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<CachedCredential, MintError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    #[serde(default)]
    expires_at: Value,
}

fn parse_expiry(value: &Value) -> Result<Option<Timestamp>, MintError> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => parse_timestamp(&n.to_string()),
        other => {
            return Err(MintError::MalformedResponse(format!(
                "unsupported expires_at value: {other}"
            )))
        }
    };
    parsed
        .map(Some)
        .map_err(|e| MintError::MalformedResponse(format!("invalid expires_at: {e}")))
}

/// Mints tokens over HTTP: `POST {base}/api/token`.
#[derive(Debug, Clone)]
pub struct HttpTokenMinter {
    client: reqwest::Client,
    base_url: Option<String>,
    auth_header: Option<String>,
}

impl HttpTokenMinter {
    /// Creates a minter from configuration.
    ///
    /// A missing base URL is not an error here; every `mint` call will
    /// report `NotConfigured` instead.
    ///
    /// # Errors
    ///
    /// Returns `MintError::Transport` if the HTTP client cannot be built.
    pub fn from_config(config: &MintingConfig) -> Result<Self, MintError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MintError::Transport(e.to_string()))?;

        if config.base_url.is_none() {
            tracing::warn!("Minting service URL not configured, token minting will fail");
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth_header: config.auth_header.clone(),
        })
    }
}

#[async_trait]
impl TokenMinter for HttpTokenMinter {
    async fn mint(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<CachedCredential, MintError> {
        let Some(base_url) = self.base_url.as_deref() else {
            tracing::error!(owner, repo, "Minting service URL not configured");
            return Err(MintError::NotConfigured("minting_service_base_url".to_string()));
        };

        let url = format!("{}/api/token", base_url.trim_end_matches('/'));
        tracing::info!(owner, repo, %url, force_refresh, "Minting repository token");

        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "force_refresh": force_refresh }));
        if let Some(auth) = &self.auth_header {
            request = request.bearer_auth(auth);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MintError::Timeout
            } else {
                MintError::Transport(redact_secrets(&e.to_string()))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                MintError::Timeout
            } else {
                MintError::Transport(redact_secrets(&e.to_string()))
            }
        })?;

        if !status.is_success() {
            let err = MintError::from_status(status.as_u16(), &body);
            tracing::error!(owner, repo, status = status.as_u16(), "Minting service returned an error");
            return Err(err);
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            MintError::MalformedResponse(format!("invalid JSON from minting service: {e}"))
        })?;

        let token = parsed
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                MintError::MalformedResponse("response missing 'access_token' field".to_string())
            })?;
        let expires_at = parse_expiry(&parsed.expires_at)?;

        tracing::info!(
            owner,
            repo,
            has_expiry = expires_at.is_some(),
            "Repository token minted"
        );

        Ok(CachedCredential::new(
            token,
            parsed.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
        ))
    }
}
