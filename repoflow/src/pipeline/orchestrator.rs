//! The pipeline orchestrator.
//!
//! A run moves through `Idle → SelectionPending → Executing(0..n) → Done`,
//! or ends in `Failed` at the first error. Without a prompt only the analysis
//! stage runs and selection is skipped.

use super::response::PipelineResponse;
use crate::changes::RevertReport;
use crate::context::{RunContext, RunIdentity};
use crate::core::{PipelineState, StageOutput};
use crate::errors::{ErrorKind, RepoflowError, StageError, ValidationError};
use crate::events::{names, EventSink, NoOpEventSink, RunEmitter};
use crate::observability::SpanTimer;
use crate::reasoning::Reasoner;
use crate::repository::{RepositoryHandle, RepositoryLocks};
use crate::selector::{SelectionDecision, Selector};
use crate::stages::{StageDeps, StageId, StageRegistry};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves and validates a repository root.
fn canonical_root(repo: &Path) -> Result<PathBuf, RepoflowError> {
    let root = repo
        .canonicalize()
        .map_err(|_| RepoflowError::NotFound(format!("repository {}", repo.display())))?;
    if !root.is_dir() {
        return Err(RepoflowError::NotFound(format!(
            "repository {} is not a directory",
            repo.display()
        )));
    }
    Ok(root)
}

/// Tracks and logs state transitions of one run.
#[derive(Debug)]
struct StateTracker {
    state: PipelineState,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
    }

    fn fail(&mut self, emitter: &RunEmitter, err: RepoflowError) -> RepoflowError {
        self.advance(PipelineState::Failed);
        tracing::warn!(kind = %err.kind(), error = %err, "Pipeline failed");
        emitter.emit(
            names::PIPELINE_FAILED,
            json!({"kind": err.kind(), "message": err.to_string()}),
        );
        err
    }
}

/// Decides which stages a request needs and runs them in order.
pub struct Orchestrator {
    reasoner: Arc<dyn Reasoner>,
    registry: Arc<StageRegistry>,
    locks: Arc<RepositoryLocks>,
    sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Creates an orchestrator with the built-in stages.
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            registry: Arc::new(StageRegistry::with_defaults()),
            locks: Arc::new(RepositoryLocks::new()),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Creates an orchestrator talking to the configured OpenAI-compatible
    /// endpoint, with the configured deadline and retry policy.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the HTTP client cannot be built.
    #[cfg(feature = "openai")]
    pub fn from_config(config: &crate::config::RepoflowConfig) -> Result<Self, RepoflowError> {
        use crate::reasoning::{GuardedReasoner, OpenAiReasoner};

        let client = OpenAiReasoner::new(&config.reasoning)?;
        let guarded = GuardedReasoner::new(Arc::new(client), config.reasoning.timeout())
            .with_retry(config.reasoning.retry.clone());
        Ok(Self::new(Arc::new(guarded)))
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Shares a lock registry with other orchestrators or services.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<RepositoryLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Replaces the stage registry.
    #[must_use]
    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// The lock registry used for repository access.
    #[must_use]
    pub fn locks(&self) -> &Arc<RepositoryLocks> {
        &self.locks
    }

    /// Runs the pipeline for `repo`.
    ///
    /// An absent or blank prompt runs repository analysis only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing repository, the selector's error if no
    /// valid decision was obtained, or the first stage failure. No partial
    /// response is returned on failure.
    pub async fn run(&self, repo: impl AsRef<Path>, prompt: Option<&str>) -> Result<PipelineResponse, RepoflowError> {
        let root = canonical_root(repo.as_ref())?;
        let prompt = prompt.filter(|p| !p.trim().is_empty());
        let identity = RunIdentity::new();
        let emitter = RunEmitter::new(self.sink.clone(), identity.clone());
        let timer = SpanTimer::start("pipeline");
        let mut tracker = StateTracker::new();

        let mut ctx = RunContext::new(root.clone(), prompt.map(str::to_string)).with_identity(identity.clone());

        tracing::info!(
            run_id = %identity.run_id,
            repository = %root.display(),
            has_prompt = prompt.is_some(),
            "Pipeline started"
        );
        emitter.emit(
            names::PIPELINE_STARTED,
            json!({"repository": root.display().to_string(), "has_prompt": prompt.is_some()}),
        );

        let stages = match prompt {
            None => vec![StageId::RepositoryAnalysis],
            Some(prompt) => {
                tracker.advance(PipelineState::SelectionPending);
                let decision = match self.select(prompt, &emitter).await {
                    Ok(decision) => decision,
                    Err(e) => return Err(tracker.fail(&emitter, e)),
                };
                let stages = decision.stages.clone();
                if let Err(e) = ctx.record_selection(decision) {
                    return Err(tracker.fail(&emitter, ValidationError::new(e.to_string()).into()));
                }
                stages
            }
        };

        let handle = RepositoryHandle::new(root.clone(), self.locks.clone());
        let deps = StageDeps::new(self.reasoner.clone());
        let mut executed = Vec::with_capacity(stages.len());

        for (index, id) in stages.iter().copied().enumerate() {
            tracker.advance(PipelineState::Executing(index));
            if let Err(e) = self.execute_stage(id, &deps, &handle, &mut ctx, &emitter).await {
                return Err(tracker.fail(&emitter, e));
            }
            executed.push(id);
        }

        tracker.advance(PipelineState::Done);
        let duration_ms = timer.finish();
        emitter.emit(
            names::PIPELINE_COMPLETED,
            json!({"stages": executed.iter().map(StageId::key).collect::<Vec<_>>(), "duration_ms": duration_ms}),
        );
        tracing::info!(run_id = %identity.run_id, duration_ms, "Pipeline completed");

        Ok(PipelineResponse::assemble(&ctx, executed, duration_ms))
    }

    async fn select(&self, prompt: &str, emitter: &RunEmitter) -> Result<SelectionDecision, RepoflowError> {
        let decision = Selector::new(self.reasoner.clone()).decide(prompt).await?;
        emitter.emit(
            names::SELECTION_COMPLETED,
            json!({
                "stages": decision.stages.iter().map(StageId::key).collect::<Vec<_>>(),
                "justification": decision.justification,
                "notes": decision.notes,
            }),
        );
        Ok(decision)
    }

    async fn execute_stage(
        &self,
        id: StageId,
        deps: &StageDeps,
        handle: &RepositoryHandle,
        ctx: &mut RunContext,
        emitter: &RunEmitter,
    ) -> Result<(), RepoflowError> {
        let stage = self.registry.build(id, deps, Some(handle))?;

        tracing::info!(stage = %id, "Stage started");
        emitter.emit(names::STAGE_STARTED, json!({"stage": id.key()}));
        let timer = SpanTimer::start(id.key());

        let output = match stage.process(ctx).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(stage = %id, kind = %err.kind, error = %err.message, "Stage failed");
                emitter.emit(
                    names::STAGE_FAILED,
                    json!({"stage": id.key(), "kind": err.kind, "message": err.message, "retryable": err.retryable}),
                );
                return Err(err.into());
            }
        };

        if output.producer() != id {
            let err = StageError::new(
                id,
                ErrorKind::ValidationFailure,
                format!("stage produced '{}', which belongs to {}", output.field(), output.producer()),
            );
            emitter.emit(names::STAGE_FAILED, json!({"stage": id.key(), "message": err.message}));
            return Err(err.into());
        }

        if let StageOutput::Modification(outcome) = &output {
            if let Some(report) = &outcome.apply {
                emitter.emit(
                    names::CHANGES_APPLIED,
                    json!({
                        "status": report.status,
                        "modified": report.modified_files,
                        "failed": report.errors.iter().map(|e| e.path.clone()).collect::<Vec<_>>(),
                    }),
                );
            }
        }

        ctx.record(output)
            .map_err(|e| RepoflowError::from(ValidationError::new(e.to_string())))?;

        let duration_ms = timer.finish();
        tracing::info!(stage = %id, duration_ms, "Stage completed");
        emitter.emit(names::STAGE_COMPLETED, json!({"stage": id.key(), "duration_ms": duration_ms}));
        Ok(())
    }

    /// Restores `paths` in `repo` from their canonical backups.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing repository; per-file failures are in
    /// the report.
    pub async fn revert(&self, repo: impl AsRef<Path>, paths: Vec<String>) -> Result<RevertReport, RepoflowError> {
        let root = canonical_root(repo.as_ref())?;
        let identity = RunIdentity::new();
        let emitter = RunEmitter::new(self.sink.clone(), identity);

        let report = RepositoryHandle::new(root, self.locks.clone())
            .changes()
            .revert(paths)
            .await?;
        emitter.emit(
            names::CHANGES_REVERTED,
            json!({"status": report.status, "reverted": report.reverted_files}),
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
