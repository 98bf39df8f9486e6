//! The compile pipeline state machine.

use crate::core::{CompileTask, PipelineOutcome, RequestContext, StatusEvent};
use crate::credentials::{CachedCredential, CredentialCache};
use crate::downstream::{DownstreamContext, DownstreamSender};
use crate::errors::CompilerError;
use crate::events::StatusPublisher;
use crate::llm::{
    compose_user_content, CompiledSpec, LanguageModel, LlmRequestEnvelope, ModelClientProvider, SystemPrompt,
};
use crate::repo::{RepoContext, RepoContextFetcher};
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// States a run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// The task passed shape validation.
    Validated,
    /// The `in_progress` event was submitted (delivered or not).
    ProgressPublished,
    /// A repository credential is in hand.
    CredentialAcquired,
    /// Repository context is assembled, possibly from fallbacks.
    ContextFetched,
    /// A model client was built from configuration.
    ClientBuilt,
    /// The model answered with a parseable artifact.
    ModelInvoked,
    /// The artifact reached the downstream sender.
    Forwarded,
    /// The terminal event was submitted (delivered or not).
    TerminalPublished,
    /// The caller was told the task was accepted.
    Acknowledged,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validated => "validated",
            Self::ProgressPublished => "progress_published",
            Self::CredentialAcquired => "credential_acquired",
            Self::ContextFetched => "context_fetched",
            Self::ClientBuilt => "client_built",
            Self::ModelInvoked => "model_invoked",
            Self::Forwarded => "forwarded",
            Self::TerminalPublished => "terminal_published",
            Self::Acknowledged => "acknowledged",
        };
        f.write_str(name)
    }
}

/// Outcome of one stage.
#[derive(Debug)]
pub enum StageResult<T> {
    /// Move to the next state with this value.
    Advance(T),
    /// Stop the run.
    Fatal(CompilerError),
}

impl<T> StageResult<T> {
    fn into_result(self, stage: PipelineState) -> Result<T, StageFailure> {
        match self {
            Self::Advance(value) => Ok(value),
            Self::Fatal(error) => Err(StageFailure { stage, error }),
        }
    }
}

impl<T, E: Into<CompilerError>> From<Result<T, E>> for StageResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Advance(value),
            Err(error) => Self::Fatal(error.into()),
        }
    }
}

struct StageFailure {
    stage: PipelineState,
    error: CompilerError,
}

/// States reached by one run, for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineTrace {
    /// States reached, in order.
    pub states: Vec<PipelineState>,
    /// The stage that failed, if any.
    pub failed_stage: Option<PipelineState>,
    /// Whether the `in_progress` event was delivered.
    pub progress_delivered: bool,
    /// Whether the terminal event was delivered.
    pub terminal_delivered: bool,
}

impl PipelineTrace {
    fn record(&mut self, state: PipelineState) {
        tracing::debug!(state = %state, "Pipeline state reached");
        self.states.push(state);
    }

    /// Returns true if `state` was reached.
    #[must_use]
    pub fn reached(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}

/// What a run hands back.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Acknowledgement for the caller.
    pub outcome: PipelineOutcome,
    /// States reached.
    pub trace: PipelineTrace,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs `stage`, turning a panic into an internal error.
async fn guarded<T, F>(stage: PipelineState, fut: F) -> StageResult<T>
where
    F: Future<Output = StageResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(stage = %stage, %reason, "Stage panicked");
            StageResult::Fatal(CompilerError::Internal(format!("{stage} stage panicked: {reason}")))
        }
    }
}

/// Sequences credential, context, model and downstream stages for one task,
/// reporting progress through the status publisher.
pub struct CompilePipeline {
    pub(super) credentials: Arc<CredentialCache>,
    pub(super) fetcher: RepoContextFetcher,
    pub(super) models: Arc<dyn ModelClientProvider>,
    pub(super) sender: Arc<dyn DownstreamSender>,
    pub(super) publisher: Arc<StatusPublisher>,
    pub(super) system_prompt: SystemPrompt,
    pub(super) skip_downstream: bool,
}

impl CompilePipeline {
    /// The credential cache shared by every run.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    /// Runs the pipeline for one task.
    ///
    /// A task that fails validation is rejected before any event is
    /// published. Every later failure produces a failed outcome and a
    /// best-effort `failed` event; publishing problems never change the
    /// outcome.
    pub async fn run(&self, task: &CompileTask, request: &RequestContext) -> PipelineRun {
        let span = tracing::info_span!(
            "compile",
            request_id = %request.request_id,
            plan_id = %task.plan_id,
            spec_index = task.spec_index,
        );
        self.run_inner(task, request).instrument(span).await
    }

    async fn run_inner(&self, task: &CompileTask, request: &RequestContext) -> PipelineRun {
        let started = Instant::now();
        let mut trace = PipelineTrace::default();

        if let Err(error) = task.validate() {
            tracing::warn!(error = %error, "Compile task rejected");
            return PipelineRun {
                outcome: PipelineOutcome::rejected_task(&request.request_id, &task.plan_id, task.spec_index, &error),
                trace,
            };
        }
        trace.record(PipelineState::Validated);
        tracing::info!(
            github_owner = %task.repo_owner,
            github_repo = %task.repo_name,
            idempotency_key = request.idempotency_key.as_deref(),
            "Compile request received"
        );

        let progress = StatusEvent::in_progress(&task.plan_id, task.spec_index, &request.request_id);
        trace.progress_delivered = self.publisher.publish_best_effort(&progress).await;
        trace.record(PipelineState::ProgressPublished);

        let outcome = match self.run_stages(task, request, &mut trace).await {
            Ok(()) => {
                let done = StatusEvent::succeeded(&task.plan_id, task.spec_index, &request.request_id);
                trace.terminal_delivered = self.publisher.publish_best_effort(&done).await;
                trace.record(PipelineState::TerminalPublished);
                trace.record(PipelineState::Acknowledged);
                tracing::info!(
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Compile request completed"
                );
                PipelineOutcome::accepted(&request.request_id, &task.plan_id, task.spec_index)
            }
            Err(StageFailure { stage, error }) => {
                trace.failed_stage = Some(stage);
                tracing::error!(
                    stage = %stage,
                    error_code = error.error_code(),
                    class = %error.class(),
                    category = %error.category(),
                    error = %error,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Compile request failed"
                );
                let failed = StatusEvent::failed(
                    &task.plan_id,
                    task.spec_index,
                    &request.request_id,
                    error.error_code(),
                    &error.to_string(),
                );
                trace.terminal_delivered = self.publisher.publish_best_effort(&failed).await;
                trace.record(PipelineState::TerminalPublished);
                PipelineOutcome::failed(&request.request_id, &task.plan_id, task.spec_index, &error)
            }
        };

        PipelineRun { outcome, trace }
    }

    async fn run_stages(
        &self,
        task: &CompileTask,
        request: &RequestContext,
        trace: &mut PipelineTrace,
    ) -> Result<(), StageFailure> {
        let credential = guarded(PipelineState::CredentialAcquired, self.acquire_credential(task))
            .await
            .into_result(PipelineState::CredentialAcquired)?;
        trace.record(PipelineState::CredentialAcquired);

        let context = self
            .fetcher
            .fetch(&task.repo_owner, &task.repo_name, &credential)
            .await;
        trace.record(PipelineState::ContextFetched);

        let client = guarded(PipelineState::ClientBuilt, async { StageResult::from(self.models.build()) })
            .await
            .into_result(PipelineState::ClientBuilt)?;
        trace.record(PipelineState::ClientBuilt);

        let compiled = guarded(
            PipelineState::ModelInvoked,
            self.invoke_model(client.as_ref(), task, request, context),
        )
        .await
        .into_result(PipelineState::ModelInvoked)?;
        trace.record(PipelineState::ModelInvoked);

        if self.skip_downstream {
            tracing::info!("Downstream stage skipped");
            return Ok(());
        }
        guarded(PipelineState::Forwarded, self.forward(task, request, &compiled))
            .await
            .into_result(PipelineState::Forwarded)?;
        trace.record(PipelineState::Forwarded);

        Ok(())
    }

    async fn acquire_credential(&self, task: &CompileTask) -> StageResult<CachedCredential> {
        self.credentials
            .get(&task.repo_owner, &task.repo_name, false)
            .await
            .into()
    }

    fn build_request(
        &self,
        task: &CompileTask,
        request: &RequestContext,
        context: RepoContext,
    ) -> Result<LlmRequestEnvelope, CompilerError> {
        let user_prompt = compose_user_content(&self.system_prompt.template, &context, &task.spec_payload)?;
        Ok(LlmRequestEnvelope::new(&request.request_id, self.models.model())
            .with_system_prompt(self.system_prompt.clone())
            .with_user_prompt(user_prompt)
            .with_repo_context(context)
            .with_metadata("plan_id", json!(task.plan_id))
            .with_metadata("spec_index", json!(task.spec_index))
            .with_metadata("github_owner", json!(task.repo_owner))
            .with_metadata("github_repo", json!(task.repo_name))
            .with_metadata("spec_data", task.spec_payload.clone()))
    }

    async fn invoke_model(
        &self,
        client: &dyn LanguageModel,
        task: &CompileTask,
        request: &RequestContext,
        context: RepoContext,
    ) -> StageResult<CompiledSpec> {
        let envelope = match self.build_request(task, request, context) {
            Ok(envelope) => envelope,
            Err(error) => return StageResult::Fatal(error),
        };

        tracing::info!(provider = client.provider(), model = %envelope.model, "Invoking model");
        let response = match client.generate_response(&envelope).await {
            Ok(response) => response,
            Err(error) => return StageResult::Fatal(error.into()),
        };

        let compiled = response.compiled_spec();
        if let Ok(spec) = &compiled {
            tracing::info!(
                provider = client.provider(),
                model = response.model.as_deref(),
                total_tokens = response.usage.map_or(0, |u| u.total_tokens),
                spec_version = %spec.version,
                issue_count = spec.issue_count(),
                "Model response parsed"
            );
        }
        compiled.into()
    }

    async fn forward(&self, task: &CompileTask, request: &RequestContext, compiled: &CompiledSpec) -> StageResult<()> {
        let context = DownstreamContext {
            plan_id: task.plan_id.clone(),
            spec_index: task.spec_index,
            request_id: request.request_id.clone(),
            repo_owner: Some(task.repo_owner.clone()),
            repo_name: Some(task.repo_name.clone()),
        };
        self.sender.send(&context, compiled).await.into()
    }
}

impl fmt::Debug for CompilePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilePipeline")
            .field("credentials", &self.credentials)
            .field("publisher", &self.publisher)
            .field("skip_downstream", &self.skip_downstream)
            .finish_non_exhaustive()
    }
}
