//! Errors raised by model backends.

use crate::errors::{ErrorClass, FailureCategory};
use thiserror::Error;

/// Errors raised while building or invoking a model client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// Unknown provider or missing API key. Raised before any network call.
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    /// The backend answered with an error or could not be reached.
    #[error("LLM API error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api {
        /// HTTP status, when the backend answered.
        status: Option<u16>,
        /// Redacted detail.
        message: String,
    },

    /// The backend output is not a compiled spec.
    #[error("Failed to parse LLM output: {0}")]
    Parse(String),

    /// The call timed out.
    #[error("LLM request timed out")]
    Timeout,
}

impl LlmError {
    /// Creates an API error.
    #[must_use]
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Configuration(_) => ErrorClass::Configuration,
            Self::Api {
                status: Some(400..=499),
                ..
            } => ErrorClass::UpstreamClient,
            Self::Api { .. } | Self::Timeout => ErrorClass::UpstreamServer,
            Self::Parse(_) => ErrorClass::Data,
        }
    }

    /// Outward category. Every backend failure, including a 4xx answer,
    /// surfaces as service unavailable.
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::Configuration(_) => FailureCategory::Configuration,
            Self::Parse(_) => FailureCategory::BadGateway,
            Self::Api { .. } | Self::Timeout => FailureCategory::ServiceUnavailable,
        }
    }

    /// Rate limits, timeouts, transport failures and 5xx answers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Api { status, .. } => match status {
                None | Some(429) => true,
                Some(s) => *s >= 500,
            },
            Self::Configuration(_) | Self::Parse(_) => false,
        }
    }

    /// Caller-safe summary.
    #[must_use]
    pub fn public_summary(&self) -> String {
        match self {
            Self::Configuration(_) => "LLM client is not configured".to_string(),
            Self::Api { status: Some(s), .. } => format!("LLM service returned status {s}"),
            Self::Api { status: None, .. } => "LLM service unreachable".to_string(),
            Self::Parse(_) => "LLM returned an unparseable result".to_string(),
            Self::Timeout => "LLM request timed out".to_string(),
        }
    }
}
