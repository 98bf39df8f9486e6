//! Ready-made tasks, documents and a pipeline wired to fakes.

use serde_json::{json, Value};
use std::sync::Arc;

use super::{FakeMinter, FakeSourceControl, RecordingSender, RecordingTransport, ScriptedModelProvider};
use crate::config::{CredentialCacheConfig, PublisherConfig};
use crate::core::{CompileTask, RequestContext};
use crate::events::{CollectingEventSink, StatusPublisher};
use crate::pipeline::retry::{JitterStrategy, RetryConfig};
use crate::pipeline::{CompilePipeline, PipelineBuilder, PipelineRun};

/// A valid structured specification payload.
#[must_use]
pub fn sample_spec() -> Value {
    json!({
        "purpose": "Let users export their reports",
        "vision": "One-click CSV export from the dashboard",
        "must": ["CSV output", "Respect user permissions"],
        "dont": ["Block the UI thread"],
        "nice": ["XLSX output"],
        "assumptions": ["Reports fit in memory"]
    })
}

/// A valid task for `acme/widgets`.
#[must_use]
pub fn sample_task(plan_id: &str) -> CompileTask {
    CompileTask::new(plan_id, 0, sample_spec(), "acme", "widgets")
}

/// Source control serving all three analysis documents.
#[must_use]
pub fn complete_documents() -> FakeSourceControl {
    FakeSourceControl::new()
        .with_document("tree.json", Ok(json!({"tree": [{"path": "src/lib.rs", "type": "blob"}]})))
        .with_document("dependencies.json", Ok(json!({"dependencies": [{"name": "serde", "version": "1"}]})))
        .with_document(
            "file-summaries.json",
            Ok(json!({"summaries": [{"path": "src/lib.rs", "summary": "Library root"}]})),
        )
}

/// A pipeline wired to recording fakes, with handles to inspect them.
///
/// Every fake is shared with the pipelines the harness builds, so calls made
/// by a run can be inspected afterwards through these fields.
pub struct TestHarness {
    pub minter: Arc<FakeMinter>,
    pub source_control: Arc<FakeSourceControl>,
    pub models: Arc<ScriptedModelProvider>,
    pub sender: Arc<RecordingSender>,
    pub transport: Arc<RecordingTransport>,
    pub events: Arc<CollectingEventSink>,
    skip_downstream: bool,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Harness where every collaborator succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            minter: Arc::new(FakeMinter::new()),
            source_control: Arc::new(complete_documents()),
            models: Arc::new(ScriptedModelProvider::new()),
            sender: Arc::new(RecordingSender::new()),
            transport: Arc::new(RecordingTransport::new()),
            events: Arc::new(CollectingEventSink::new()),
            skip_downstream: false,
        }
    }

    /// Replaces the minter.
    #[must_use]
    pub fn with_minter(mut self, minter: FakeMinter) -> Self {
        self.minter = Arc::new(minter);
        self
    }

    /// Replaces the source-control client.
    #[must_use]
    pub fn with_source_control(mut self, client: FakeSourceControl) -> Self {
        self.source_control = Arc::new(client);
        self
    }

    /// Replaces the model provider.
    #[must_use]
    pub fn with_models(mut self, models: ScriptedModelProvider) -> Self {
        self.models = Arc::new(models);
        self
    }

    /// Replaces the downstream sender.
    #[must_use]
    pub fn with_sender(mut self, sender: RecordingSender) -> Self {
        self.sender = Arc::new(sender);
        self
    }

    /// Replaces the topic transport.
    #[must_use]
    pub fn with_transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Bypasses the downstream stage.
    #[must_use]
    pub const fn skip_downstream(mut self) -> Self {
        self.skip_downstream = true;
        self
    }

    /// Builds the pipeline. Publisher retries carry no jitter.
    #[must_use]
    pub fn pipeline(&self) -> CompilePipeline {
        let publisher_config = PublisherConfig::for_topic("test-project", "plan-status")
            .with_retry(RetryConfig::publisher().with_jitter(JitterStrategy::None));
        let publisher = StatusPublisher::new(&publisher_config, self.transport.clone());

        let built = PipelineBuilder::new()
            .with_minter(self.minter.clone(), &CredentialCacheConfig::default())
            .with_source_control(self.source_control.clone())
            .with_event_sink(self.events.clone())
            .with_models(self.models.clone())
            .with_sender(self.sender.clone())
            .with_publisher(Arc::new(publisher))
            .skip_downstream(self.skip_downstream)
            .build();
        match built {
            Ok(pipeline) => pipeline,
            Err(e) => panic!("test harness is incomplete: {e}"),
        }
    }

    /// Builds a pipeline and runs `task` once.
    pub async fn run(&self, task: &CompileTask) -> PipelineRun {
        self.pipeline().run(task, &RequestContext::generate()).await
    }
}
