//! Recording fakes for every collaborator of the pipeline.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::credentials::{CachedCredential, MintError, TokenMinter};
use crate::downstream::{DownstreamContext, DownstreamError, DownstreamSender};
use crate::events::{TopicTransport, TransportCode, TransportError};
use crate::llm::{
    CompiledSpec, LanguageModel, LlmError, LlmRequestEnvelope, LlmResponseEnvelope, ModelClientProvider, StubClient,
    TokenUsage,
};
use crate::repo::{DocumentError, SourceControlClient};

/// A message accepted by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    /// Full `projects/.../topics/...` path.
    pub topic_path: String,
    /// Ordering key the message was published under.
    pub ordering_key: String,
    /// Decoded message body.
    pub event: Value,
    /// When the publish call started.
    pub started_at: Instant,
    /// When the publish call completed.
    pub finished_at: Instant,
}

/// In-memory topic that records successful publishes.
///
/// Failures queued with [`fail_next`](Self::fail_next) are consumed one per
/// call, at the start of the call.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    latency: Option<Duration>,
    failures: Mutex<VecDeque<TransportCode>>,
    calls: Mutex<usize>,
    published: Mutex<Vec<PublishedMessage>>,
}

impl RecordingTransport {
    /// Creates a transport that accepts everything immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fails the next unanswered call with `code`.
    pub fn fail_next(&self, code: TransportCode) {
        self.failures.lock().push_back(code);
    }

    /// Number of publish calls, successful or not.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    /// Successful publishes in completion order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Statuses published for `plan_id`, in completion order.
    #[must_use]
    pub fn statuses_for(&self, plan_id: &str) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.ordering_key == plan_id)
            .filter_map(|m| m.event["status"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl TopicTransport for RecordingTransport {
    async fn publish(&self, topic_path: &str, data: &[u8], ordering_key: &str) -> Result<String, TransportError> {
        let started_at = Instant::now();
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        let failure = self.failures.lock().pop_front();

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(code) = failure {
            return Err(TransportError::new(code, format!("injected failure on call {call}")));
        }

        let event = serde_json::from_slice(data).unwrap_or(Value::Null);
        self.published.lock().push(PublishedMessage {
            topic_path: topic_path.to_string(),
            ordering_key: ordering_key.to_string(),
            event,
            started_at,
            finished_at: Instant::now(),
        });
        Ok(format!("msg-{call}"))
    }
}

/// Token minter returning queued results, then a fixed default.
#[derive(Debug)]
pub struct FakeMinter {
    scripted: Mutex<VecDeque<Result<CachedCredential, MintError>>>,
    fallback: Result<CachedCredential, MintError>,
    calls: Mutex<Vec<(String, String, bool)>>,
}

impl Default for FakeMinter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMinter {
    /// Creates a minter issuing a non-expiring `test-token`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Ok(CachedCredential::new("test-token", "bearer", None)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a minter whose every call fails with `error`.
    #[must_use]
    pub fn failing(error: MintError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::new()
        }
    }

    /// Queues a result.
    pub fn push(&self, result: Result<CachedCredential, MintError>) {
        self.scripted.lock().push_back(result);
    }

    /// Number of mint calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// `(owner, repo, force_refresh)` of every call.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String, bool)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TokenMinter for FakeMinter {
    async fn mint(&self, owner: &str, repo: &str, force_refresh: bool) -> Result<CachedCredential, MintError> {
        self.calls
            .lock()
            .push((owner.to_string(), repo.to_string(), force_refresh));
        self.scripted
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Source-control client serving documents by file name.
///
/// Unknown paths answer `NotFound`.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    documents: Mutex<HashMap<String, Result<Value, DocumentError>>>,
    panic_message: Option<String>,
    calls: Mutex<usize>,
}

impl FakeSourceControl {
    /// Creates a client with no documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that panics on every call.
    #[must_use]
    pub fn panicking(message: impl Into<String>) -> Self {
        Self {
            panic_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Serves `result` for paths ending in `file_name`.
    #[must_use]
    pub fn with_document(self, file_name: &str, result: Result<Value, DocumentError>) -> Self {
        self.documents.lock().insert(file_name.to_string(), result);
        self
    }

    /// Number of document requests.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl SourceControlClient for FakeSourceControl {
    async fn get_json_document(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        _token: &str,
    ) -> Result<Value, DocumentError> {
        *self.calls.lock() += 1;
        if let Some(message) = &self.panic_message {
            panic!("{message}");
        }
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.documents
            .lock()
            .get(file_name)
            .cloned()
            .unwrap_or_else(|| {
                Err(DocumentError::NotFound {
                    path: path.to_string(),
                })
            })
    }
}

/// What a [`ScriptedModel`] answers.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Raw content returned as a successful response.
    Content(String),
    /// An error.
    Error(LlmError),
    /// Panics inside the call.
    Panic(String),
}

/// Language model answering from a script, falling back to the stub.
#[derive(Debug)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<LlmRequestEnvelope>>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn generate_response(&self, request: &LlmRequestEnvelope) -> Result<LlmResponseEnvelope, LlmError> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(ScriptedReply::Content(content)) => Ok(LlmResponseEnvelope::success(&request.request_id, content)
                .with_model("scripted-model")
                .with_usage(TokenUsage::default())),
            Some(ScriptedReply::Error(error)) => Err(error),
            Some(ScriptedReply::Panic(message)) => panic!("{message}"),
            None => StubClient::new("scripted", "scripted-model").generate_response(request),
        }
    }
}

/// Model provider for pipeline tests.
#[derive(Debug)]
pub struct ScriptedModelProvider {
    build_error: Option<LlmError>,
    model: Arc<ScriptedModel>,
    builds: Mutex<usize>,
}

impl Default for ScriptedModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModelProvider {
    /// Creates a provider whose model answers with the stub sample.
    #[must_use]
    pub fn new() -> Self {
        Self {
            build_error: None,
            model: Arc::new(ScriptedModel {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }),
            builds: Mutex::new(0),
        }
    }

    /// Creates a provider that cannot build a client.
    #[must_use]
    pub fn failing_build(error: LlmError) -> Self {
        Self {
            build_error: Some(error),
            ..Self::new()
        }
    }

    /// Queues a reply.
    #[must_use]
    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        self.model.replies.lock().push_back(reply);
        self
    }

    /// Requests the model received.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequestEnvelope> {
        self.model.requests.lock().clone()
    }

    /// Number of successful and failed builds.
    #[must_use]
    pub fn build_count(&self) -> usize {
        *self.builds.lock()
    }
}

impl ModelClientProvider for ScriptedModelProvider {
    fn model(&self) -> String {
        "scripted-model".to_string()
    }

    fn build(&self) -> Result<Arc<dyn LanguageModel>, LlmError> {
        *self.builds.lock() += 1;
        match &self.build_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.model.clone()),
        }
    }
}

/// Downstream sender that records what it was given.
#[derive(Debug, Default)]
pub struct RecordingSender {
    failure: Option<DownstreamError>,
    sent: Mutex<Vec<(DownstreamContext, CompiledSpec)>>,
}

impl RecordingSender {
    /// Creates a sender that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sender that always fails with `error`.
    #[must_use]
    pub fn failing(error: DownstreamError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(DownstreamContext, CompiledSpec)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl DownstreamSender for RecordingSender {
    async fn send(&self, context: &DownstreamContext, compiled: &CompiledSpec) -> Result<(), DownstreamError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.sent.lock().push((context.clone(), compiled.clone()));
        Ok(())
    }
}
