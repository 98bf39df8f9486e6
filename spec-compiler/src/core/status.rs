//! Plan status events published to the scheduler.

use crate::utils::{iso_timestamp, sanitize_error_message, MAX_ERROR_MESSAGE_CHARS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of one specification within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Compilation has started.
    InProgress,
    /// Compilation finished and the artifact was forwarded.
    Succeeded,
    /// Compilation stopped on a fatal error.
    Failed,
}

impl PlanStatus {
    /// Returns true for `succeeded` and `failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A status update for one (plan, spec) pair.
///
/// Field names are part of the scheduler contract and serialize exactly as
/// declared, with absent error fields rendered as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Plan the specification belongs to; also the ordering key.
    pub plan_id: String,
    /// Position of the specification within its plan.
    pub spec_index: i64,
    /// Progress being reported.
    pub status: PlanStatus,
    /// Correlation id of the run.
    pub request_id: String,
    /// ISO 8601, UTC.
    pub timestamp: String,
    /// Stable error code, set on `failed` only.
    pub error_code: Option<String>,
    /// Bounded and secret-scrubbed; see [`sanitize_error_message`].
    pub error_message: Option<String>,
}

impl StatusEvent {
    fn new(plan_id: &str, spec_index: i64, status: PlanStatus, request_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            spec_index,
            status,
            request_id: request_id.to_string(),
            timestamp: iso_timestamp(),
            error_code: None,
            error_message: None,
        }
    }

    /// Creates an `in_progress` event.
    #[must_use]
    pub fn in_progress(plan_id: &str, spec_index: i64, request_id: &str) -> Self {
        Self::new(plan_id, spec_index, PlanStatus::InProgress, request_id)
    }

    /// Creates a `succeeded` event.
    #[must_use]
    pub fn succeeded(plan_id: &str, spec_index: i64, request_id: &str) -> Self {
        Self::new(plan_id, spec_index, PlanStatus::Succeeded, request_id)
    }

    /// Creates a `failed` event.
    ///
    /// The message is truncated to 10 000 characters and scrubbed of
    /// secrets; a blank message is dropped.
    #[must_use]
    pub fn failed(
        plan_id: &str,
        spec_index: i64,
        request_id: &str,
        error_code: &str,
        error_message: &str,
    ) -> Self {
        let mut event = Self::new(plan_id, spec_index, PlanStatus::Failed, request_id);
        event.error_code = Some(error_code.to_string());
        event.error_message = sanitize_error_message(error_message, MAX_ERROR_MESSAGE_CHARS);
        event
    }

    /// Ordering key used by the publisher.
    #[must_use]
    pub fn ordering_key(&self) -> &str {
        &self.plan_id
    }

    /// Serializes the event to UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[test]
    fn test_in_progress_serialization_has_null_error_fields() {
        let event = StatusEvent::in_progress("plan-1", 2, "req-1");
        let value: Value = serde_json::from_slice(&event.to_json_bytes().unwrap()).unwrap();
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["spec_index"], 2);
        assert!(value["error_code"].is_null());
        assert!(value["error_message"].is_null());
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 7);
    }

    #[test]
    fn test_failed_event_is_sanitized() {
        let message = format!("Bearer abc123 then {}", "retry ".repeat(4_000));
        let event = StatusEvent::failed("plan-1", 0, "req-1", "minting_error", &message);
        let text = event.error_message.unwrap();
        assert!(text.chars().count() <= MAX_ERROR_MESSAGE_CHARS);
        assert!(!text.contains("abc123"));
        assert!(text.ends_with("... (truncated)"));
    }

    #[test]
    fn test_failed_blank_message_dropped() {
        let event = StatusEvent::failed("plan-1", 0, "req-1", "internal_error", "  ");
        assert_eq!(event.error_code.as_deref(), Some("internal_error"));
        assert!(event.error_message.is_none());
    }

    #[test]
    fn test_ordering_key_is_plan_id() {
        let event = StatusEvent::succeeded("plan-9", 1, "req");
        assert_eq!(event.ordering_key(), "plan-9");
        assert!(event.status.is_terminal());
    }
}
