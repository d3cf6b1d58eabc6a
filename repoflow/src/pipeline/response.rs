//! The structured result of an orchestrator run.

use crate::context::RunContext;
use crate::core::PipelineState;
use crate::selector::SelectionDecision;
use crate::stages::{ModificationOutcome, RepositoryStats, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregated result of a successful run.
///
/// Only the outputs actually produced are present; the code blob is never
/// returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Canonical repository root.
    pub repository: String,
    /// Final state; `Done` for every returned response.
    pub state: PipelineState,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// Stages executed, in order.
    pub executed_stages: Vec<StageId>,
    /// The selector's decision, when a prompt was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionDecision>,
    /// Repository statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RepositoryStats>,
    /// Plan text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// Explanation and applied changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<ModificationOutcome>,
}

impl PipelineResponse {
    pub(crate) fn assemble(ctx: &RunContext, executed_stages: Vec<StageId>, duration_ms: u64) -> Self {
        Self {
            run_id: ctx.identity().run_id,
            started_at: ctx.identity().started_at,
            repository: ctx.repo_root().display().to_string(),
            state: PipelineState::Done,
            duration_ms,
            executed_stages,
            selection: ctx.selection().cloned(),
            analysis: ctx.analysis().cloned(),
            plan: ctx.plan().map(str::to_string),
            modification: ctx.modification().cloned(),
        }
    }

    /// The selection justification, when selection occurred.
    #[must_use]
    pub fn justification(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.justification.as_str())
    }
}
