//! Assertions for pipeline runs and published events.

use super::RecordingTransport;
use crate::core::PipelineOutcome;
use crate::pipeline::PipelineRun;

/// Asserts that the run was accepted.
pub fn assert_accepted(run: &PipelineRun) {
    assert!(
        run.outcome.is_accepted(),
        "Expected accepted outcome, got {:?} (trace: {:?})",
        run.outcome,
        run.trace.states
    );
    assert_eq!(run.outcome.http_status(), 202);
}

/// Asserts that the run failed with `error_code` and HTTP-equivalent `status`.
pub fn assert_failed_with(run: &PipelineRun, error_code: &str, status: u16) {
    assert_outcome_failed(&run.outcome, error_code, status);
}

/// Asserts that an outcome failed with `error_code` and `status`.
pub fn assert_outcome_failed(outcome: &PipelineOutcome, error_code: &str, status: u16) {
    assert!(!outcome.is_accepted(), "Expected failure, got {outcome:?}");
    assert_eq!(
        outcome.error_code.as_deref(),
        Some(error_code),
        "Unexpected error code in {outcome:?}"
    );
    assert_eq!(outcome.http_status(), status, "Unexpected status in {outcome:?}");
}

/// Asserts that `plan_id` received exactly `in_progress` then `terminal`.
pub fn assert_event_pair(transport: &RecordingTransport, plan_id: &str, terminal: &str) {
    let statuses = transport.statuses_for(plan_id);
    assert_eq!(
        statuses,
        vec!["in_progress".to_string(), terminal.to_string()],
        "Unexpected status sequence for plan {plan_id}"
    );
}
