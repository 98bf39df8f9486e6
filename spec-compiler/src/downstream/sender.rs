//! Forwarding compiled specs to their consumer.

use crate::config::DownstreamConfig;
use crate::errors::ErrorClass;
use crate::llm::CompiledSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while forwarding a compiled spec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownstreamError {
    /// The forwarding context is incomplete.
    #[error("Downstream context validation failed: {0}")]
    Validation(String),

    /// The target could not accept the artifact.
    #[error("Downstream send failed: {0}")]
    Send(String),
}

impl DownstreamError {
    /// Downstream failures are always internal to the service.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        ErrorClass::Internal
    }

    /// Caller-safe summary.
    #[must_use]
    pub fn public_summary(&self) -> String {
        match self {
            Self::Validation(_) => "Failed to validate downstream context".to_string(),
            Self::Send(_) => "Failed to forward compiled spec".to_string(),
        }
    }
}

/// Identifies the task a compiled spec belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamContext {
    /// Plan id; must not be blank.
    pub plan_id: String,
    /// Position of the specification within its plan.
    pub spec_index: i64,
    /// Correlation id; must not be blank.
    pub request_id: String,
    /// Repository owner, when known.
    #[serde(rename = "github_owner")]
    pub repo_owner: Option<String>,
    /// Repository name, when known.
    #[serde(rename = "github_repo")]
    pub repo_name: Option<String>,
}

impl DownstreamContext {
    /// Checks that the identifiers are usable.
    ///
    /// # Errors
    ///
    /// Returns `DownstreamError::Validation` naming the first bad field.
    pub fn validate(&self) -> Result<(), DownstreamError> {
        if self.plan_id.trim().is_empty() {
            return Err(DownstreamError::Validation("plan_id cannot be empty or whitespace".to_string()));
        }
        if self.request_id.trim().is_empty() {
            return Err(DownstreamError::Validation(
                "request_id cannot be empty or whitespace".to_string(),
            ));
        }
        if self.spec_index < 0 {
            return Err(DownstreamError::Validation(
                "spec_index must be a non-negative integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Forwards compiled specs to their consumer.
#[async_trait]
pub trait DownstreamSender: Send + Sync {
    /// Sends `compiled` for the task described by `context`.
    async fn send(&self, context: &DownstreamContext, compiled: &CompiledSpec) -> Result<(), DownstreamError>;
}

/// Emits a structured log record instead of calling a remote target.
#[derive(Debug, Clone)]
pub struct LoggingDownstreamSender {
    target_uri: String,
    skip_send: bool,
}

impl LoggingDownstreamSender {
    /// Creates a sender from configuration.
    #[must_use]
    pub fn from_config(config: &DownstreamConfig) -> Self {
        let target_uri = if config.target_uri.trim().is_empty() {
            DownstreamConfig::default().target_uri
        } else {
            config.target_uri.clone()
        };
        tracing::info!(%target_uri, skip_send = config.skip_send, "Downstream sender initialized");
        Self {
            target_uri,
            skip_send: config.skip_send,
        }
    }

    /// Logical target recorded with every send.
    #[must_use]
    pub fn target_uri(&self) -> &str {
        &self.target_uri
    }
}

#[async_trait]
impl DownstreamSender for LoggingDownstreamSender {
    async fn send(&self, context: &DownstreamContext, compiled: &CompiledSpec) -> Result<(), DownstreamError> {
        context.validate()?;

        if self.skip_send {
            tracing::info!(
                plan_id = %context.plan_id,
                spec_index = context.spec_index,
                request_id = %context.request_id,
                github_owner = context.repo_owner.as_deref(),
                github_repo = context.repo_name.as_deref(),
                downstream_target = %self.target_uri,
                spec_version = %compiled.version,
                issue_count = compiled.issue_count(),
                skip_reason = "feature_flag_disabled",
                "Downstream send skipped"
            );
        } else {
            tracing::info!(
                plan_id = %context.plan_id,
                spec_index = context.spec_index,
                request_id = %context.request_id,
                github_owner = context.repo_owner.as_deref(),
                github_repo = context.repo_name.as_deref(),
                downstream_target = %self.target_uri,
                spec_version = %compiled.version,
                issue_count = compiled.issue_count(),
                send_status = "executed",
                "Downstream send attempt (logging mode)"
            );
        }
        Ok(())
    }
}
