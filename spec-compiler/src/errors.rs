//! Error types for the spec compiler.
//!
//! Every collaborator-facing component owns its own error enum; this module
//! ties them together into [`CompilerError`] and defines how each failure is
//! classified ([`ErrorClass`]) and surfaced to the caller
//! ([`FailureCategory`] plus a stable `error_code`).

use crate::config::ConfigError;
use crate::credentials::MintError;
use crate::downstream::DownstreamError;
use crate::llm::LlmError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error taxonomy shared by every collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Missing or invalid settings. Fatal, never retried.
    Configuration,
    /// 4xx-equivalent answer from a collaborator. Fatal, never retried.
    UpstreamClient,
    /// 5xx, timeout or transport failure. Retried by the publisher only.
    UpstreamServer,
    /// Malformed response body.
    Data,
    /// Anything unexpected.
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::UpstreamClient => write!(f, "upstream_client"),
            Self::UpstreamServer => write!(f, "upstream_server"),
            Self::Data => write!(f, "data"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Caller-visible failure category, with HTTP-style semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The request payload failed shape validation.
    Validation,
    /// The request payload exceeded the configured size limit.
    PayloadTooLarge,
    /// The service itself is misconfigured.
    Configuration,
    /// A collaborator rejected the request or returned garbage.
    BadGateway,
    /// A collaborator is unavailable or timed out.
    ServiceUnavailable,
    /// Unexpected failure.
    Internal,
}

impl FailureCategory {
    /// Maps the category onto an HTTP status code.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 422,
            Self::PayloadTooLarge => 413,
            Self::Configuration | Self::Internal => 500,
            Self::BadGateway => 502,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Derives the outward category from an error class.
    #[must_use]
    pub const fn from_class(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Configuration => Self::Configuration,
            ErrorClass::UpstreamClient | ErrorClass::Data => Self::BadGateway,
            ErrorClass::UpstreamServer => Self::ServiceUnavailable,
            ErrorClass::Internal => Self::Internal,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::PayloadTooLarge => write!(f, "payload_too_large"),
            Self::Configuration => write!(f, "configuration"),
            Self::BadGateway => write!(f, "bad_gateway"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `spec.purpose`).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a compile request fails shape validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more fields are invalid.
    #[error("Request validation failed: {}", format_fields(.0))]
    Fields(Vec<FieldError>),

    /// The body is not valid JSON for a compile request.
    #[error("Malformed request body: {0}")]
    Malformed(String),

    /// The body exceeds the configured limit.
    #[error("Request body exceeds maximum size limit of {limit} bytes")]
    TooLarge {
        /// Actual body size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Returns the caller-visible category.
    #[must_use]
    pub const fn category(&self) -> FailureCategory {
        match self {
            Self::TooLarge { .. } => FailureCategory::PayloadTooLarge,
            Self::Fields(_) | Self::Malformed(_) => FailureCategory::Validation,
        }
    }

    /// Returns the field errors, if any.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        match self {
            Self::Fields(fields) => fields,
            _ => &[],
        }
    }
}

/// The main error type for the spec compiler.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// Request shape validation failed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Service configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The credential could not be minted.
    #[error("{0}")]
    Mint(#[from] MintError),

    /// Building or invoking the model client failed.
    #[error("{0}")]
    Llm(#[from] LlmError),

    /// Forwarding the compiled artifact failed.
    #[error("{0}")]
    Downstream(#[from] DownstreamError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CompilerError {
    /// Classifies the error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::Internal(_) => ErrorClass::Internal,
            Self::Config(_) => ErrorClass::Configuration,
            Self::Mint(e) => e.class(),
            Self::Llm(e) => e.class(),
            Self::Downstream(e) => e.class(),
        }
    }

    /// Stable machine-readable code carried in `failed` status events.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Config(_) => "configuration_error",
            Self::Mint(_) => "minting_error",
            Self::Llm(LlmError::Configuration(_)) => "llm_configuration_error",
            Self::Llm(LlmError::Parse(_)) => "llm_parse_error",
            Self::Llm(_) => "llm_api_error",
            Self::Downstream(DownstreamError::Validation(_)) => "downstream_validation_error",
            Self::Downstream(_) => "downstream_sender_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Caller-visible category.
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Validation(e) => e.category(),
            Self::Mint(e) => e.category(),
            Self::Llm(e) => e.category(),
            other => FailureCategory::from_class(other.class()),
        }
    }

    /// Short, stage-level summary that is safe to show to the caller.
    ///
    /// Raw collaborator bodies are never part of this text.
    #[must_use]
    pub fn public_summary(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Config(_) => "Service configuration error".to_string(),
            Self::Mint(e) => e.public_summary(),
            Self::Llm(e) => e.public_summary(),
            Self::Downstream(e) => e.public_summary(),
            Self::Internal(_) => "Unexpected internal error".to_string(),
        }
    }

    /// Converts to a dictionary representation for structured logging.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("error_code".to_string(), serde_json::json!(self.error_code()));
        map.insert("class".to_string(), serde_json::json!(self.class().to_string()));
        map.insert("category".to_string(), serde_json::json!(self.category().to_string()));
        map.insert("message".to_string(), serde_json::json!(self.public_summary()));
        map
    }
}
