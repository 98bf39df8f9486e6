//! Anthropic messages backend.

use super::http::{build_client, latency_ms, post_with_retry};
use super::openai::empty_context;
use super::{compose_user_content, LlmError, LlmRequestEnvelope, LlmResponseEnvelope, TokenUsage};
use crate::config::LlmConfig;
use crate::pipeline::retry::RetryConfig;
use serde::Deserialize;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: Option<String>,
    model: Option<String>,
    role: Option<String>,
    stop_reason: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Calls `POST {base}/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    model: String,
    api_base: String,
    retry: RetryConfig,
}

impl AnthropicClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Configuration` when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .claude_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(
                    "Anthropic API key not configured. Set CLAUDE_API_KEY environment variable.".to_string(),
                )
            })?;

        let http = build_client(
            &[("x-api-key", api_key), ("anthropic-version", ANTHROPIC_VERSION)],
            config.timeout(),
        )?;
        tracing::info!(model = %config.claude_model, max_retries = config.max_retries, "Anthropic client initialized");

        Ok(Self {
            http,
            model: config.claude_model.clone(),
            api_base: config.claude_api_base.trim_end_matches('/').to_string(),
            retry: RetryConfig::llm(config.max_retries),
        })
    }

    /// Configured model id.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &LlmRequestEnvelope) -> Result<Value, LlmError> {
        let system = request.system_prompt.template.trim();
        if system.is_empty() {
            return Err(LlmError::Configuration("system prompt is empty".to_string()));
        }
        let user = if request.user_prompt.trim().is_empty() {
            let context = request.repo_context.clone().unwrap_or_else(empty_context);
            compose_user_content(system, &context, &request.spec_data())?
        } else {
            request.user_prompt.clone()
        };

        Ok(json!({
            "model": self.model,
            "system": system,
            "messages": [{"role": "user", "content": user}],
            "max_tokens": request.system_prompt.max_tokens,
        }))
    }

    pub(crate) async fn generate_response(
        &self,
        request: &LlmRequestEnvelope,
    ) -> Result<LlmResponseEnvelope, LlmError> {
        let body = self.request_body(request)?;
        let url = format!("{}/messages", self.api_base);

        let (message, latency) = post_with_retry::<MessageResponse>(
            &self.http,
            &url,
            &body,
            &self.retry,
            "anthropic",
            &request.request_id,
        )
        .await?;

        let response =
            parse_message(message, &request.request_id)?.with_metadata("latency_ms", json!(latency_ms(latency)));

        tracing::info!(
            request_id = %request.request_id,
            model = %self.model,
            total_tokens = response.usage.map_or(0, |u| u.total_tokens),
            latency_ms = latency_ms(latency),
            "Anthropic response received"
        );
        Ok(response)
    }
}

fn parse_message(message: MessageResponse, request_id: &str) -> Result<LlmResponseEnvelope, LlmError> {
    if message.content.is_empty() {
        return Err(LlmError::api(None, "Response contains no content"));
    }
    let text: String = message
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(LlmError::api(None, "Response content contains no text"));
    }

    let usage = message.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.input_tokens,
        completion_tokens: u.output_tokens,
        total_tokens: u.input_tokens + u.output_tokens,
    });

    let mut response = LlmResponseEnvelope::success(request_id, text)
        .with_usage(usage)
        .with_metadata("provider", json!("anthropic"))
        .with_metadata("response_id", json!(message.id))
        .with_metadata("role", json!(message.role))
        .with_metadata("stop_reason", json!(message.stop_reason));
    if let Some(model) = message.model {
        response = response.with_metadata("model", json!(model)).with_model(model);
    }
    Ok(response)
}
