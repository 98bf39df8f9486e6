//! Core domain types for the compile service.
//!
//! - Compile tasks and request validation
//! - Request correlation context
//! - Plan status events
//! - Pipeline outcomes

mod outcome;
mod request;
mod status;
mod task;

pub use outcome::{OutcomeStatus, PipelineOutcome};
pub use request::{RequestContext, MAX_IDEMPOTENCY_KEY_LEN};
pub use status::{PlanStatus, StatusEvent};
pub use task::{validate_request_body, CompileSpec, CompileTask};
