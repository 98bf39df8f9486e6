//! Deterministic backend for local runs and tests.

use super::{CompiledSpec, LlmError, LlmRequestEnvelope, LlmResponseEnvelope, TokenUsage};
use serde_json::json;

/// Sample compiled spec returned by the stub backend.
pub const SAMPLE_COMPILED_SPEC: &str = r#"{
  "version": "af/1.1",
  "issues": [
    {
      "id": "ISSUE-1",
      "title": "Add request validation layer",
      "description": "Validate incoming payloads and reject malformed requests with field-level errors.",
      "labels": ["backend", "validation"],
      "depends_on": []
    },
    {
      "id": "ISSUE-2",
      "title": "Persist compilation results",
      "description": "Store compiled output keyed by plan and spec index.",
      "labels": ["backend", "storage"],
      "depends_on": ["ISSUE-1"]
    },
    {
      "id": "ISSUE-3",
      "title": "Document the compilation workflow",
      "description": "Describe inputs, outputs and failure modes for operators.",
      "labels": ["docs"],
      "depends_on": ["ISSUE-2"]
    }
  ]
}"#;

/// Deterministic backend for local runs and tests. Makes no network calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubClient {
    simulated_provider: String,
    simulated_model: String,
}

impl StubClient {
    /// Creates a stub standing in for `provider`/`model`.
    #[must_use]
    pub fn new(simulated_provider: impl Into<String>, simulated_model: impl Into<String>) -> Self {
        Self {
            simulated_provider: simulated_provider.into(),
            simulated_model: simulated_model.into(),
        }
    }

    pub(crate) fn generate_response(&self, request: &LlmRequestEnvelope) -> Result<LlmResponseEnvelope, LlmError> {
        let compiled = CompiledSpec::parse(SAMPLE_COMPILED_SPEC)?;
        tracing::info!(
            request_id = %request.request_id,
            version = %compiled.version,
            issues = compiled.issue_count(),
            simulated_provider = %self.simulated_provider,
            "Generated stub response"
        );

        Ok(LlmResponseEnvelope::success(&request.request_id, SAMPLE_COMPILED_SPEC)
            .with_model("stub-model")
            .with_usage(TokenUsage::default())
            .with_metadata("stub_mode", json!(true))
            .with_metadata("simulated_provider", json!(self.simulated_provider))
            .with_metadata("simulated_model", json!(self.simulated_model))
            .with_metadata("version", json!(compiled.version))
            .with_metadata("issue_count", json!(compiled.issue_count())))
    }
}
