//! Source-control document access.

use crate::config::GitHubConfig;
use crate::utils::{redact_secrets, redacted_excerpt};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Errors raised while reading a repository document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The document does not exist.
    #[error("Document not found: {path}")]
    NotFound {
        /// Repository path that was requested.
        path: String,
    },

    /// The API answered with a non-success status.
    #[error("Source control API returned status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Truncated, redacted response excerpt.
        body: Option<String>,
    },

    /// The request could not be delivered or timed out.
    #[error("Source control request failed: {0}")]
    Transport(String),

    /// The API response or its content could not be decoded.
    #[error("Failed to decode document: {0}")]
    Decode(String),

    /// The document content is not JSON.
    #[error("Document is not valid JSON: {0}")]
    InvalidJson(String),

    /// The credential cannot be placed in a header.
    #[error("Invalid token: contains newline characters")]
    InvalidToken,
}

/// Reads JSON documents from a repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    /// Fetches `path` from `owner/repo` and parses it as JSON.
    async fn get_json_document(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        token: &str,
    ) -> Result<Value, DocumentError>;
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<Value>,
    encoding: Option<String>,
}

fn decode_content(response: ContentsResponse) -> Result<String, DocumentError> {
    match response.encoding.as_deref() {
        Some("base64") => {
            let encoded = match response.content {
                Some(Value::String(s)) if !s.is_empty() => s,
                _ => return Err(DocumentError::Decode("response missing 'content' field".to_string())),
            };
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| DocumentError::Decode(format!("invalid base64 content: {e}")))?;
            String::from_utf8(bytes).map_err(|e| DocumentError::Decode(format!("content is not UTF-8: {e}")))
        }
        None | Some("") => match response.content {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(DocumentError::Decode("content is not a string".to_string())),
            None => Err(DocumentError::Decode("response has no encoding and no content".to_string())),
        },
        Some(other) => Err(DocumentError::Decode(format!("unexpected encoding: {other}"))),
    }
}

/// Reads documents through the GitHub contents API.
#[derive(Debug, Clone)]
pub struct GitHubContentsClient {
    client: reqwest::Client,
    api_base_url: String,
}

impl GitHubContentsClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &GitHubConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SourceControlClient for GitHubContentsClient {
    async fn get_json_document(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        token: &str,
    ) -> Result<Value, DocumentError> {
        if token.contains('\n') || token.contains('\r') {
            return Err(DocumentError::InvalidToken);
        }

        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.api_base_url);
        tracing::debug!(owner, repo, path, "Fetching repository document");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DocumentError::Transport(redact_secrets(&e.to_string())))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DocumentError::Transport(redact_secrets(&e.to_string())))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DocumentError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DocumentError::Http {
                status: status.as_u16(),
                body: Some(redacted_excerpt(&text, 500)),
            });
        }

        let contents: ContentsResponse = serde_json::from_str(&text)
            .map_err(|e| DocumentError::Decode(format!("invalid API response: {e}")))?;
        let decoded = decode_content(contents)?;

        serde_json::from_str(&decoded).map_err(|e| DocumentError::InvalidJson(e.to_string()))
    }
}
