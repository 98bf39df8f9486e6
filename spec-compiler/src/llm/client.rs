//! Backend selection.

use super::{AnthropicClient, LlmError, LlmRequestEnvelope, LlmResponseEnvelope, OpenAiClient, StubClient};
use crate::config::LlmConfig;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Anything that turns a request envelope into a response envelope.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short backend name for logs.
    fn provider(&self) -> &str;

    /// Calls the backend.
    async fn generate_response(&self, request: &LlmRequestEnvelope) -> Result<LlmResponseEnvelope, LlmError>;
}

/// The backends the service can talk to.
#[derive(Debug, Clone)]
pub enum ModelClient {
    /// Deterministic sample output, no network.
    Stub(StubClient),
    /// OpenAI chat completions.
    OpenAi(OpenAiClient),
    /// Anthropic messages.
    Anthropic(AnthropicClient),
}

impl ModelClient {
    /// Selects a backend from configuration.
    ///
    /// Stub mode wins over the provider name. Performs no network I/O.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Configuration` for an unknown provider or a
    /// missing API key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = config.provider.trim().to_ascii_lowercase();

        if config.stub_mode {
            tracing::info!(simulated_provider = %provider, "Creating stub model client");
            return Ok(Self::Stub(StubClient::new(provider, config.model_for_provider())));
        }

        match provider.as_str() {
            "openai" => Ok(Self::OpenAi(OpenAiClient::from_config(config)?)),
            "anthropic" => Ok(Self::Anthropic(AnthropicClient::from_config(config)?)),
            other => Err(LlmError::Configuration(format!(
                "Unknown LLM provider: '{other}'. Supported providers: openai, anthropic"
            ))),
        }
    }
}

#[async_trait]
impl LanguageModel for ModelClient {
    fn provider(&self) -> &str {
        match self {
            Self::Stub(_) => "stub",
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
        }
    }

    async fn generate_response(&self, request: &LlmRequestEnvelope) -> Result<LlmResponseEnvelope, LlmError> {
        match self {
            Self::Stub(client) => client.generate_response(request),
            Self::OpenAi(client) => client.generate_response(request).await,
            Self::Anthropic(client) => client.generate_response(request).await,
        }
    }
}

/// Builds a model client for one pipeline run.
pub trait ModelClientProvider: Send + Sync {
    /// Model id requests should carry.
    fn model(&self) -> String;

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Configuration` if no client can be built.
    fn build(&self) -> Result<Arc<dyn LanguageModel>, LlmError>;
}

/// Provider backed by [`ModelClient::from_config`].
#[derive(Clone)]
pub struct ConfiguredModelProvider {
    config: LlmConfig,
}

impl ConfiguredModelProvider {
    /// Creates a provider.
    #[must_use]
    pub const fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

impl ModelClientProvider for ConfiguredModelProvider {
    fn model(&self) -> String {
        self.config.model_for_provider().to_string()
    }

    fn build(&self) -> Result<Arc<dyn LanguageModel>, LlmError> {
        Ok(Arc::new(ModelClient::from_config(&self.config)?))
    }
}

impl fmt::Debug for ConfiguredModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredModelProvider")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_mode_wins_over_provider() {
        let client = ModelClient::from_config(&LlmConfig::stub().with_provider("unknown")).unwrap();
        assert!(matches!(client, ModelClient::Stub(_)));
        assert_eq!(client.provider(), "stub");
    }

    #[test]
    fn test_unknown_provider() {
        let err = ModelClient::from_config(&LlmConfig::default().with_provider("gemini")).unwrap_err();
        assert!(matches!(err, LlmError::Configuration(msg) if msg.contains("gemini")));
    }

    #[test]
    fn test_provider_name_is_case_insensitive() {
        let config = LlmConfig {
            claude_api_key: Some("key".into()),
            ..LlmConfig::default().with_provider(" Anthropic ")
        };
        assert!(matches!(ModelClient::from_config(&config).unwrap(), ModelClient::Anthropic(_)));
    }

    #[test]
    fn test_missing_key_fails_selection() {
        assert!(matches!(
            ModelClient::from_config(&LlmConfig::default()),
            Err(LlmError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_provider_builds_stub() {
        let provider = ConfiguredModelProvider::new(LlmConfig::stub());
        assert_eq!(provider.model(), "gpt-5.1");
        let client = provider.build().unwrap();
        let response = client
            .generate_response(&LlmRequestEnvelope::new("r", provider.model()))
            .await
            .unwrap();
        assert_eq!(response.model.as_deref(), Some("stub-model"));
    }
}
