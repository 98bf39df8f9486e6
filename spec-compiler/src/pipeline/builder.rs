//! Pipeline assembly.

use super::CompilePipeline;
use crate::config::{CredentialCacheConfig, ServiceConfig};
use crate::credentials::{CredentialCache, HttpTokenMinter, MintError, TokenMinter};
use crate::downstream::{DownstreamSender, LoggingDownstreamSender};
use crate::events::{EventSink, LoggingEventSink, StatusPublisher};
use crate::llm::{ConfiguredModelProvider, ModelClientProvider, SystemPrompt};
use crate::repo::{GitHubContentsClient, RepoContextFetcher, SourceControlClient};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling a pipeline.
#[derive(Debug, Error)]
pub enum PipelineBuildError {
    /// A required collaborator was not supplied.
    #[error("Pipeline is missing its {0}")]
    MissingComponent(&'static str),

    /// The token minter could not be created.
    #[error("Failed to create token minter: {0}")]
    Minter(#[from] MintError),

    /// The source-control HTTP client could not be created.
    #[error("Failed to create source control client: {0}")]
    SourceControl(#[from] reqwest::Error),
}

/// Builder for [`CompilePipeline`].
///
/// The credential cache, source-control client, model provider and
/// downstream sender are required. Publishing defaults to disabled and
/// repository events go to the log.
pub struct PipelineBuilder {
    credentials: Option<Arc<CredentialCache>>,
    source_control: Option<Arc<dyn SourceControlClient>>,
    events: Arc<dyn EventSink>,
    models: Option<Arc<dyn ModelClientProvider>>,
    sender: Option<Arc<dyn DownstreamSender>>,
    publisher: Arc<StatusPublisher>,
    system_prompt: SystemPrompt,
    skip_downstream: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            credentials: None,
            source_control: None,
            events: Arc::new(LoggingEventSink::default()),
            models: None,
            sender: None,
            publisher: Arc::new(StatusPublisher::disabled()),
            system_prompt: SystemPrompt::default(),
            skip_downstream: false,
        }
    }

    /// Uses an existing credential cache.
    #[must_use]
    pub fn with_credential_cache(mut self, cache: Arc<CredentialCache>) -> Self {
        self.credentials = Some(cache);
        self
    }

    /// Builds a credential cache in front of `minter`.
    #[must_use]
    pub fn with_minter(self, minter: Arc<dyn TokenMinter>, config: &CredentialCacheConfig) -> Self {
        self.with_credential_cache(Arc::new(CredentialCache::new(minter, config)))
    }

    /// Sets the source-control client.
    #[must_use]
    pub fn with_source_control(mut self, client: Arc<dyn SourceControlClient>) -> Self {
        self.source_control = Some(client);
        self
    }

    /// Sets the sink for repository-context events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the model provider.
    #[must_use]
    pub fn with_models(mut self, models: Arc<dyn ModelClientProvider>) -> Self {
        self.models = Some(models);
        self
    }

    /// Sets the downstream sender.
    #[must_use]
    pub fn with_sender(mut self, sender: Arc<dyn DownstreamSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Sets the status publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<StatusPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Bypasses the downstream stage entirely.
    #[must_use]
    pub const fn skip_downstream(mut self, skip: bool) -> Self {
        self.skip_downstream = skip;
        self
    }

    /// Assembles the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `MissingComponent` naming the first required collaborator
    /// that was not supplied.
    pub fn build(self) -> Result<CompilePipeline, PipelineBuildError> {
        let credentials = self
            .credentials
            .ok_or(PipelineBuildError::MissingComponent("credential cache"))?;
        let source_control = self
            .source_control
            .ok_or(PipelineBuildError::MissingComponent("source control client"))?;
        let models = self
            .models
            .ok_or(PipelineBuildError::MissingComponent("model provider"))?;
        let sender = self
            .sender
            .ok_or(PipelineBuildError::MissingComponent("downstream sender"))?;

        Ok(CompilePipeline {
            credentials,
            fetcher: RepoContextFetcher::new(source_control, self.events),
            models,
            sender,
            publisher: self.publisher,
            system_prompt: self.system_prompt,
            skip_downstream: self.skip_downstream,
        })
    }
}

impl CompilePipeline {
    /// Returns a new builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Wires the production collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be created.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineBuildError> {
        let minter = HttpTokenMinter::from_config(&config.minting)?;
        let source_control = GitHubContentsClient::from_config(&config.github)?;

        Self::builder()
            .with_minter(Arc::new(minter), &config.credential_cache)
            .with_source_control(Arc::new(source_control))
            .with_models(Arc::new(ConfiguredModelProvider::new(config.llm.clone())))
            .with_sender(Arc::new(LoggingDownstreamSender::from_config(&config.downstream)))
            .with_publisher(Arc::new(StatusPublisher::from_config(&config.publisher)))
            .with_system_prompt(SystemPrompt::new(config.llm.system_prompt.as_deref(), config.llm.max_tokens))
            .build()
    }

    /// Bypasses (or restores) the downstream stage.
    #[must_use]
    pub const fn with_skip_downstream(mut self, skip: bool) -> Self {
        self.skip_downstream = skip;
        self
    }
}
