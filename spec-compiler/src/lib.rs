//! # Spec Compiler
//!
//! Turns a structured product specification into a compiled artifact by
//! running it through a language model together with context about the
//! target repository.
//!
//! One compile task flows through a fixed sequence of stages:
//!
//! - **Credentials**: a per-repository token, cached until shortly before it expires
//! - **Repository context**: pre-computed tree, dependency and summary documents,
//!   each replaced by a placeholder when unavailable
//! - **Model invocation**: OpenAI, Anthropic or a deterministic stub
//! - **Forwarding**: the parsed artifact goes to a downstream consumer
//!
//! Progress is reported as ordered `in_progress` and terminal status events on
//! a message topic. Publishing is best-effort and never changes the outcome.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spec_compiler::prelude::*;
//!
//! let config = ServiceConfig::from_env()?;
//! let pipeline = CompilePipeline::from_config(&config)?;
//!
//! let task = validate_request_body(&body, config.max_request_body_bytes)?;
//! let run = pipeline.run(&task, &RequestContext::generate()).await;
//! println!("{}", run.outcome.http_status());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod credentials;
pub mod downstream;
pub mod errors;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod repo;
pub mod utils;

#[cfg(test)]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigError, ServiceConfig};
    pub use crate::core::{validate_request_body, CompileTask, PipelineOutcome, RequestContext, StatusEvent};
    pub use crate::credentials::{CachedCredential, CredentialCache, TokenMinter};
    pub use crate::downstream::{DownstreamContext, DownstreamSender};
    pub use crate::errors::{CompilerError, ErrorClass, FailureCategory, ValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, StatusPublisher, TopicTransport};
    pub use crate::llm::{CompiledSpec, LanguageModel, LlmError, ModelClient, ModelClientProvider};
    pub use crate::pipeline::{CompilePipeline, PipelineBuilder, PipelineRun, PipelineState};
    pub use crate::repo::{RepoContext, RepoContextFetcher, SourceControlClient};
    pub use crate::utils::{generate_request_id, iso_timestamp, Timestamp};
}
