//! OpenAI chat completions backend.

use super::http::{build_client, latency_ms, post_with_retry};
use super::{compose_user_content, LlmError, LlmRequestEnvelope, LlmResponseEnvelope, TokenUsage};
use crate::config::LlmConfig;
use crate::pipeline::retry::RetryConfig;
use crate::repo::RepoContext;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    id: Option<String>,
    created: Option<i64>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Calls `POST {base}/chat/completions` with JSON-object output.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    model: String,
    api_base: String,
    retry: RetryConfig,
}

impl OpenAiClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Configuration` when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(
                    "OpenAI API key not configured. Set OPENAI_API_KEY environment variable.".to_string(),
                )
            })?;

        let authorization = format!("Bearer {api_key}");
        let http = build_client(&[("authorization", authorization.as_str())], config.timeout())?;
        tracing::info!(model = %config.openai_model, max_retries = config.max_retries, "OpenAI client initialized");

        Ok(Self {
            http,
            model: config.openai_model.clone(),
            api_base: config.openai_api_base.trim_end_matches('/').to_string(),
            retry: RetryConfig::llm(config.max_retries),
        })
    }

    /// Configured model id.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &LlmRequestEnvelope) -> Result<Value, LlmError> {
        let system = request.system_prompt.template.as_str();
        let user = if request.user_prompt.trim().is_empty() {
            let context = request.repo_context.clone().unwrap_or_else(empty_context);
            compose_user_content(system, &context, &request.spec_data())?
        } else {
            request.user_prompt.clone()
        };

        Ok(json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
            "max_tokens": request.system_prompt.max_tokens,
        }))
    }

    pub(crate) async fn generate_response(
        &self,
        request: &LlmRequestEnvelope,
    ) -> Result<LlmResponseEnvelope, LlmError> {
        let body = self.request_body(request)?;
        let url = format!("{}/chat/completions", self.api_base);

        let (completion, latency) =
            post_with_retry::<ChatCompletion>(&self.http, &url, &body, &self.retry, "openai", &request.request_id)
                .await?;

        let response = parse_completion(completion, &request.request_id)?
            .with_metadata("latency_ms", json!(latency_ms(latency)));

        tracing::info!(
            request_id = %request.request_id,
            model = %self.model,
            total_tokens = response.usage.map_or(0, |u| u.total_tokens),
            latency_ms = latency_ms(latency),
            "OpenAI response received"
        );
        Ok(response)
    }
}

pub(super) fn empty_context() -> RepoContext {
    RepoContext {
        tree: Vec::new(),
        dependencies: Vec::new(),
        file_summaries: Vec::new(),
    }
}

fn parse_completion(completion: ChatCompletion, request_id: &str) -> Result<LlmResponseEnvelope, LlmError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::api(None, "Response contains no choices"))?;
    let content = choice
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::api(None, "Response choice contains no message content"))?;

    let usage = completion.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let mut response = LlmResponseEnvelope::success(request_id, content)
        .with_usage(usage)
        .with_metadata("provider", json!("openai"))
        .with_metadata("response_id", json!(completion.id))
        .with_metadata("created", json!(completion.created))
        .with_metadata("finish_reason", json!(choice.finish_reason));
    if let Some(model) = completion.model {
        response = response.with_metadata("model", json!(model)).with_model(model);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SystemPrompt;

    fn config() -> LlmConfig {
        LlmConfig {
            openai_api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = OpenAiClient::from_config(&LlmConfig::default()).unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));

        let blank = LlmConfig {
            openai_api_key: Some("  ".into()),
            ..LlmConfig::default()
        };
        assert!(OpenAiClient::from_config(&blank).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let client = OpenAiClient::from_config(&config()).unwrap();
        let request = LlmRequestEnvelope::new("r", "gpt-5.1")
            .with_system_prompt(SystemPrompt::new(Some("be precise"), 1000))
            .with_user_prompt("compile");
        let body = client.request_body(&request).unwrap();

        assert_eq!(body["model"], "gpt-5.1");
        assert_eq!(body["messages"][0]["content"], "be precise");
        assert_eq!(body["messages"][1]["content"], "compile");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_request_body_composes_missing_user_prompt() {
        let client = OpenAiClient::from_config(&config()).unwrap();
        let request = LlmRequestEnvelope::new("r", "gpt-5.1").with_metadata("spec_data", json!({"purpose": "p"}));
        let body = client.request_body(&request).unwrap();
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("=== SPECIFICATION DATA ==="));
    }

    #[test]
    fn test_parse_completion() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "created": 1,
            "model": "gpt-5.1",
            "choices": [{"message": {"content": "{}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let response = parse_completion(completion, "r").unwrap();
        assert_eq!(response.content, "{}");
        assert_eq!(response.model.as_deref(), Some("gpt-5.1"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.metadata["finish_reason"], "stop");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let completion: ChatCompletion = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(parse_completion(completion, "r"), Err(LlmError::Api { .. })));
    }
}
