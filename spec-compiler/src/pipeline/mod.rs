//! Pipeline assembly and execution.
//!
//! This module provides:
//! - [`CompilePipeline`], the staged state machine for one compile task
//! - [`PipelineBuilder`] for wiring its collaborators
//! - Retry policies shared by the publisher and the model backends

mod builder;
mod orchestrator;
pub mod retry;


pub use builder::{PipelineBuildError, PipelineBuilder};
pub use orchestrator::{CompilePipeline, PipelineRun, PipelineState, PipelineTrace, StageResult};
pub use retry::{
    retry_classified, should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryOutcome,
    RetryState,
};
