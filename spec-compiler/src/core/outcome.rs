//! The acknowledgement returned to the caller of a pipeline run.

use crate::errors::{CompilerError, FailureCategory, ValidationError};
use crate::utils::redact_secrets;
use serde::{Deserialize, Serialize};

/// Caller-visible status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The specification was compiled and forwarded.
    Accepted,
    /// The run stopped on a fatal error.
    Failed,
}

/// Result of one pipeline run. Never carries the compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Correlation id of the run.
    pub request_id: String,
    /// Plan id echoed from the task.
    pub plan_id: String,
    /// Spec index echoed from the task.
    pub spec_index: i64,
    /// Accepted or failed.
    pub status: OutcomeStatus,
    /// Short human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Outward category, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
    /// Stable error code, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl PipelineOutcome {
    /// Creates an accepted outcome.
    #[must_use]
    pub fn accepted(request_id: &str, plan_id: &str, spec_index: i64) -> Self {
        Self {
            request_id: request_id.to_string(),
            plan_id: plan_id.to_string(),
            spec_index,
            status: OutcomeStatus::Accepted,
            message: Some("Request accepted for processing".to_string()),
            category: None,
            error_code: None,
        }
    }

    /// Creates a failed outcome from a pipeline error. The message is
    /// scrubbed of anything that looks like a credential.
    #[must_use]
    pub fn failed(request_id: &str, plan_id: &str, spec_index: i64, error: &CompilerError) -> Self {
        Self {
            request_id: request_id.to_string(),
            plan_id: plan_id.to_string(),
            spec_index,
            status: OutcomeStatus::Failed,
            message: Some(redact_secrets(&error.public_summary())),
            category: Some(error.category()),
            error_code: Some(error.error_code().to_string()),
        }
    }

    /// Creates a failed outcome for a request rejected before a task existed.
    #[must_use]
    pub fn rejected(request_id: &str, error: &ValidationError) -> Self {
        Self::rejected_task(request_id, "", 0, error)
    }

    /// Creates a failed outcome for a parsed task that failed validation,
    /// echoing its identifiers as received.
    #[must_use]
    pub fn rejected_task(request_id: &str, plan_id: &str, spec_index: i64, error: &ValidationError) -> Self {
        Self {
            request_id: request_id.to_string(),
            plan_id: plan_id.to_string(),
            spec_index,
            status: OutcomeStatus::Failed,
            message: Some(error.to_string()),
            category: Some(error.category()),
            error_code: Some("validation_error".to_string()),
        }
    }

    /// HTTP-equivalent status for this outcome.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match (self.status, self.category) {
            (OutcomeStatus::Accepted, _) => 202,
            (OutcomeStatus::Failed, Some(category)) => category.http_status(),
            (OutcomeStatus::Failed, None) => FailureCategory::Internal.http_status(),
        }
    }

    /// Returns true if the run was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == OutcomeStatus::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MintError;

    #[test]
    fn test_accepted_is_202() {
        let outcome = PipelineOutcome::accepted("r", "p", 0);
        assert_eq!(outcome.http_status(), 202);
        assert!(outcome.is_accepted());
        assert!(outcome.error_code.is_none());
    }

    #[test]
    fn test_failed_carries_category_and_code() {
        let err = CompilerError::from(MintError::Timeout);
        let outcome = PipelineOutcome::failed("r", "p", 1, &err);
        assert_eq!(outcome.http_status(), 503);
        assert_eq!(outcome.error_code.as_deref(), Some("minting_error"));
    }

    #[test]
    fn test_rejected_oversized_is_413() {
        let outcome =
            PipelineOutcome::rejected("r", &ValidationError::TooLarge { size: 20, limit: 10 });
        assert_eq!(outcome.http_status(), 413);
    }

    #[test]
    fn test_rejected_task_echoes_identifiers() {
        let outcome = PipelineOutcome::rejected_task("r", "plan-7", 3, &ValidationError::Malformed("bad".to_string()));
        assert_eq!(outcome.plan_id, "plan-7");
        assert_eq!(outcome.spec_index, 3);
        assert_eq!(outcome.http_status(), 422);
        assert_eq!(outcome.error_code.as_deref(), Some("validation_error"));
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let json = serde_json::to_value(PipelineOutcome::accepted("r", "p", 0)).unwrap();
        assert_eq!(json["status"], "accepted");
        assert!(json.get("error_code").is_none());
    }
}
