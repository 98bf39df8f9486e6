//! Model client abstraction.
//!
//! [`ModelClient`] is a closed set of backends (deterministic stub, OpenAI,
//! Anthropic) chosen from configuration. Every backend accepts an
//! [`LlmRequestEnvelope`] and returns an [`LlmResponseEnvelope`] whose
//! content parses as a [`CompiledSpec`].

mod anthropic;
mod client;
mod envelope;
mod error;
mod http;
mod input;
mod openai;
mod stub;

pub use anthropic::AnthropicClient;
pub use client::{ConfiguredModelProvider, LanguageModel, ModelClient, ModelClientProvider};
pub use envelope::{
    CompiledSpec, LlmRequestEnvelope, LlmResponseEnvelope, ResponseStatus, SystemPrompt, TokenUsage,
    DEFAULT_SYSTEM_PROMPT,
};
pub use error::LlmError;
pub use input::{compose_structured_content, compose_user_content};
pub use openai::OpenAiClient;
pub use stub::{StubClient, SAMPLE_COMPILED_SPEC};
