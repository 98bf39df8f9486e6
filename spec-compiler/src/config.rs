//! Service configuration.
//!
//! Every setting has a default so that a bare environment yields a working
//! (stub-backed, publisher-disabled) service. Values are read from the
//! process environment by [`ServiceConfig::from_env`], or from any lookup
//! function by [`ServiceConfig::from_lookup`], which is what tests use.

use crate::pipeline::retry::{BackoffStrategy, JitterStrategy, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// Name of the environment variable.
        var: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

const REDACTED: &str = "[REDACTED]";

fn redact_opt(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| REDACTED)
}

/// Token-minting service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct MintingConfig {
    /// Base URL of the minting service. Unset means minting is not configured.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Value of the `Authorization` header sent to the minting service.
    #[serde(default)]
    pub auth_header: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_minting_timeout")]
    pub timeout_seconds: f64,
}

fn default_minting_timeout() -> f64 {
    10.0
}

impl Default for MintingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_header: None,
            timeout_seconds: default_minting_timeout(),
        }
    }
}

impl MintingConfig {
    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

impl fmt::Debug for MintingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintingConfig")
            .field("base_url", &self.base_url)
            .field("auth_header", &redact_opt(self.auth_header.as_ref()))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Credential cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialCacheConfig {
    /// When false every lookup mints a fresh credential.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Credentials expiring within this many seconds are refreshed.
    #[serde(default = "default_buffer_seconds")]
    pub buffer_seconds: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_buffer_seconds() -> u64 {
    300
}

impl Default for CredentialCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            buffer_seconds: default_buffer_seconds(),
        }
    }
}

impl CredentialCacheConfig {
    /// Sets the expiry safety buffer.
    #[must_use]
    pub fn with_buffer_seconds(mut self, seconds: u64) -> Self {
        self.buffer_seconds = seconds;
        self
    }

    /// Enables or disables caching.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Source-control API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the contents API.
    #[serde(default = "default_github_api")]
    pub api_base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_github_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_github_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    concat!("spec-compiler/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_github_api(),
            timeout_seconds: default_github_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl GitHubConfig {
    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

/// Model backend settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: `openai` or `anthropic`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Forces the deterministic stub regardless of provider.
    #[serde(default)]
    pub stub_mode: bool,
    /// Attempts per model call, including the first.
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    /// Per-call timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: f64,
    /// Output token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// OpenAI API key.
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// OpenAI model id.
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// OpenAI API base URL.
    #[serde(default = "default_openai_base")]
    pub openai_api_base: String,
    /// Anthropic API key.
    #[serde(default)]
    pub claude_api_key: Option<String>,
    /// Anthropic model id.
    #[serde(default = "default_claude_model")]
    pub claude_model: String,
    /// Anthropic API base URL.
    #[serde(default = "default_claude_base")]
    pub claude_api_base: String,
    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_llm_retries() -> u32 {
    3
}

fn default_llm_timeout() -> f64 {
    120.0
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_openai_model() -> String {
    "gpt-5.1".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_claude_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_claude_base() -> String {
    "https://api.anthropic.com/v1".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            stub_mode: false,
            max_retries: default_llm_retries(),
            timeout_seconds: default_llm_timeout(),
            max_tokens: default_max_tokens(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_api_base: default_openai_base(),
            claude_api_key: None,
            claude_model: default_claude_model(),
            claude_api_base: default_claude_base(),
            system_prompt: None,
        }
    }
}

impl LlmConfig {
    /// Returns a config that always selects the stub backend.
    #[must_use]
    pub fn stub() -> Self {
        Self {
            stub_mode: true,
            ..Self::default()
        }
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Model id for the configured provider.
    #[must_use]
    pub fn model_for_provider(&self) -> &str {
        if self.provider.eq_ignore_ascii_case("anthropic") {
            &self.claude_model
        } else {
            &self.openai_model
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("stub_mode", &self.stub_mode)
            .field("max_retries", &self.max_retries)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("openai_api_key", &redact_opt(self.openai_api_key.as_ref()))
            .field("openai_model", &self.openai_model)
            .field("claude_api_key", &redact_opt(self.claude_api_key.as_ref()))
            .field("claude_model", &self.claude_model)
            .finish_non_exhaustive()
    }
}

/// Status publisher settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Cloud project hosting the topic.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Topic receiving plan status events.
    #[serde(default)]
    pub topic: Option<String>,
    /// REST endpoint of the message bus.
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: String,
    /// Optional bearer token for the message bus.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_seconds: f64,
    /// Retry policy for transient failures.
    #[serde(default = "RetryConfig::publisher")]
    pub retry: RetryConfig,
}

fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_publish_timeout() -> f64 {
    10.0
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            topic: None,
            endpoint: default_pubsub_endpoint(),
            access_token: None,
            publish_timeout_seconds: default_publish_timeout(),
            retry: RetryConfig::publisher(),
        }
    }
}

impl PublisherConfig {
    /// Creates a config targeting `project`/`topic`.
    #[must_use]
    pub fn for_topic(project: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            project_id: Some(project.into()),
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Gets the per-attempt timeout as Duration.
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.publish_timeout_seconds)
    }
}

impl fmt::Debug for PublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherConfig")
            .field("project_id", &self.project_id)
            .field("topic", &self.topic)
            .field("endpoint", &self.endpoint)
            .field("access_token", &redact_opt(self.access_token.as_ref()))
            .field("publish_timeout_seconds", &self.publish_timeout_seconds)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Downstream sender settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Logical target recorded with every forwarded artifact.
    #[serde(default = "default_target_uri")]
    pub target_uri: String,
    /// Log a skip instead of forwarding.
    #[serde(default)]
    pub skip_send: bool,
}

fn default_target_uri() -> String {
    "placeholder://downstream/target".to_string()
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            target_uri: default_target_uri(),
            skip_send: false,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default = "default_log_json")]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_log_json(),
        }
    }
}

/// Top-level configuration for the compile service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Deployment environment name.
    #[serde(default = "default_app_env")]
    pub app_env: String,
    /// Token-minting service.
    #[serde(default)]
    pub minting: MintingConfig,
    /// Credential cache.
    #[serde(default)]
    pub credential_cache: CredentialCacheConfig,
    /// Source-control API.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Model backends.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Status publisher.
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// Downstream sender.
    #[serde(default)]
    pub downstream: DownstreamConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body")]
    pub max_request_body_bytes: usize,
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_max_body() -> usize {
    10 * 1024 * 1024 // 10MB
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            app_env: default_app_env(),
            minting: MintingConfig::default(),
            credential_cache: CredentialCacheConfig::default(),
            github: GitHubConfig::default(),
            llm: LlmConfig::default(),
            publisher: PublisherConfig::default(),
            downstream: DownstreamConfig::default(),
            logging: LoggingConfig::default(),
            max_request_body_bytes: default_max_body(),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Unset or blank variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable holds an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        if let Some(value) = env.string("APP_ENV") {
            config.app_env = value;
        }
        if let Some(value) = env.parse("MAX_REQUEST_BODY_SIZE_BYTES")? {
            config.max_request_body_bytes = value;
        }

        config.minting.base_url = env.string("MINTING_SERVICE_BASE_URL");
        config.minting.auth_header = env.string("MINTING_SERVICE_AUTH_HEADER");

        if let Some(value) = env.flag("TOKEN_CACHE_ENABLED")? {
            config.credential_cache.enabled = value;
        }
        if let Some(value) = env.parse("TOKEN_CACHE_BUFFER_SECONDS")? {
            config.credential_cache.buffer_seconds = value;
        }

        if let Some(value) = env.string("GITHUB_API_BASE_URL") {
            config.github.api_base_url = value;
        }

        let llm = &mut config.llm;
        if let Some(value) = env.string("LLM_PROVIDER") {
            llm.provider = value.to_ascii_lowercase();
        }
        if let Some(value) = env.flag("LLM_STUB_MODE")? {
            llm.stub_mode = value;
        }
        if let Some(value) = env.parse("LLM_MAX_RETRIES")? {
            llm.max_retries = value;
        }
        if let Some(value) = env.parse("LLM_TIMEOUT")? {
            llm.timeout_seconds = value;
        }
        llm.openai_api_key = env.string("OPENAI_API_KEY");
        if let Some(value) = env.string("OPENAI_MODEL") {
            llm.openai_model = value;
        }
        if let Some(value) = env.string("OPENAI_API_BASE") {
            llm.openai_api_base = value;
        }
        llm.claude_api_key = env.string("CLAUDE_API_KEY");
        if let Some(value) = env.string("CLAUDE_MODEL") {
            llm.claude_model = value;
        }
        if let Some(value) = env.string("CLAUDE_API_BASE") {
            llm.claude_api_base = value;
        }
        llm.system_prompt = env.string("SYSTEM_PROMPT");

        config.publisher.project_id = env.string("GCP_PROJECT_ID");
        config.publisher.topic = env.string("PUBSUB_TOPIC_PLAN_STATUS");
        if let Some(value) = env.string("PUBSUB_ENDPOINT") {
            config.publisher.endpoint = value;
        }
        config.publisher.access_token = env.string("PUBSUB_ACCESS_TOKEN");

        if let Some(value) = env.string("DOWNSTREAM_TARGET_URI") {
            config.downstream.target_uri = value;
        }
        if let Some(value) = env.flag("SKIP_DOWNSTREAM_SEND")? {
            config.downstream.skip_send = value;
        }

        if let Some(value) = env.string("LOG_LEVEL") {
            config.logging.level = value.to_ascii_lowercase();
        }
        if let Some(value) = env.flag("LOG_JSON")? {
            config.logging.json = value;
        }

        Ok(config)
    }

    /// Returns true when running in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, var: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.string(var)
            .map(|raw| raw.parse::<T>().map_err(|e| ConfigError::invalid(var, e.to_string())))
            .transpose()
    }

    fn flag(&self, var: &str) -> Result<Option<bool>, ConfigError> {
        self.string(var)
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::invalid(var, format!("expected a boolean, got '{other}'"))),
            })
            .transpose()
    }
}

impl RetryConfig {
    /// Retry policy used for status publishing: 4 attempts, 500 ms base,
    /// 5 s cap, up to 10% additive jitter.
    #[must_use]
    pub fn publisher() -> Self {
        Self::new()
            .with_max_attempts(4)
            .with_base_delay_ms(500)
            .with_max_delay_ms(5_000)
            .with_backoff(BackoffStrategy::Exponential)
            .with_jitter(JitterStrategy::Additive)
    }

    /// Retry policy for model backends: `attempts` total, waiting 1 s, 2 s,
    /// 4 s, ... between them.
    #[must_use]
    pub fn llm(attempts: u32) -> Self {
        Self::new()
            .with_max_attempts(usize::try_from(attempts.max(1)).unwrap_or(1))
            .with_base_delay_ms(1_000)
            .with_max_delay_ms(60_000)
            .with_backoff(BackoffStrategy::Exponential)
            .with_jitter(JitterStrategy::None)
    }
}
