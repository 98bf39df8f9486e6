//! Request and response envelopes exchanged with model backends.

use super::LlmError;
use crate::repo::RepoContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Built-in system prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a specification compiler. Given a product \
specification and context about the target repository, produce a JSON object with a \
`version` string and an `issues` array. Each issue describes one concrete, independently \
implementable unit of work grounded in the repository's structure and dependencies. \
Respond with JSON only.";

/// System prompt settings for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPrompt {
    /// Prompt text.
    pub template: String,
    /// Output token cap.
    pub max_tokens: u32,
}

impl SystemPrompt {
    /// Creates a prompt, substituting the built-in default for blank text.
    #[must_use]
    pub fn new(template: Option<&str>, max_tokens: u32) -> Self {
        let template = template
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        Self {
            template: template.to_string(),
            max_tokens,
        }
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(None, 4096)
    }
}

/// Everything a backend needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequestEnvelope {
    /// Correlation id.
    pub request_id: String,
    /// Backend model id.
    pub model: String,
    /// System prompt.
    pub system_prompt: SystemPrompt,
    /// Composed user content.
    pub user_prompt: String,
    /// Repository context handed to the model.
    pub repo_context: Option<RepoContext>,
    /// Free-form request metadata (`plan_id`, `spec_data`, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl LlmRequestEnvelope {
    /// Creates an envelope with an empty prompt and no context.
    #[must_use]
    pub fn new(request_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            model: model.into(),
            system_prompt: SystemPrompt::default(),
            user_prompt: String::new(),
            repo_context: None,
            metadata: Map::new(),
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Sets the user prompt.
    #[must_use]
    pub fn with_user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = prompt.into();
        self
    }

    /// Attaches repository context.
    #[must_use]
    pub fn with_repo_context(mut self, context: RepoContext) -> Self {
        self.repo_context = Some(context);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The specification data carried in metadata, or an empty object.
    #[must_use]
    pub fn spec_data(&self) -> Value {
        self.metadata
            .get("spec_data")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// Backend response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Content is available.
    Success,
    /// The backend reported an error.
    Error,
    /// No answer yet.
    #[default]
    Pending,
    /// The call timed out.
    Timeout,
    /// The backend throttled the call.
    RateLimited,
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent.
    pub prompt_tokens: u64,
    /// Tokens generated.
    pub completion_tokens: u64,
    /// Sum of both.
    pub total_tokens: u64,
}

/// A backend answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponseEnvelope {
    /// Correlation id copied from the request.
    pub request_id: String,
    /// Outcome status.
    #[serde(default)]
    pub status: ResponseStatus,
    /// Raw model output.
    #[serde(default)]
    pub content: String,
    /// Model that produced the output.
    pub model: Option<String>,
    /// Token usage, when reported.
    pub usage: Option<TokenUsage>,
    /// Provider metadata (latency, response id, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl LlmResponseEnvelope {
    /// Creates a successful response.
    #[must_use]
    pub fn success(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResponseStatus::Success,
            content: content.into(),
            model: None,
            usage: None,
            metadata: Map::new(),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Parses the content as a compiled spec.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Parse` when the content is not a compiled spec.
    pub fn compiled_spec(&self) -> Result<CompiledSpec, LlmError> {
        CompiledSpec::parse(&self.content)
    }
}

/// The structured result of a compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSpec {
    /// Output schema version.
    pub version: String,
    /// Work items.
    pub issues: Vec<Value>,
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

impl CompiledSpec {
    /// Parses model output, tolerating a surrounding Markdown code fence.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Parse` on blank, non-JSON or wrongly shaped text.
    pub fn parse(text: &str) -> Result<Self, LlmError> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err(LlmError::Parse("empty model output".to_string()));
        }
        let spec: Self = serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
        if spec.version.trim().is_empty() {
            return Err(LlmError::Parse("missing version".to_string()));
        }
        Ok(spec)
    }

    /// Number of issues.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }
}
