//! Planner stage: asks the reasoning capability for an investigation plan.

use super::{Stage, StageId};
use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::StageError;
use crate::reasoning::{Reasoner, ReasoningRequest};
use async_trait::async_trait;
use std::sync::Arc;

const PLANNER_SYSTEM: &str = "You are a senior software engineer planning how to investigate and \
change a code repository. Produce a concise, ordered, numbered plan. Each step names the files or \
areas to inspect and what to look for or change.";

/// Stage producing plan text from analysis statistics and the prompt.
///
/// The plan is opaque text: an empty or unstructured response is still a plan.
pub struct PlannerStage {
    reasoner: Arc<dyn Reasoner>,
}

impl PlannerStage {
    /// Creates a planner backed by `reasoner`.
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Builds the planning request.
    #[must_use]
    pub fn build_request(stats_json: &str, prompt: &str) -> ReasoningRequest {
        ReasoningRequest::new("planner")
            .system(PLANNER_SYSTEM)
            .user(format!(
                "Repository statistics:\n{stats_json}\n\nUser request: \"{prompt}\"\n\n\
                 Provide an ordered investigation plan for answering or implementing this request."
            ))
            .with_temperature(0.3)
    }
}

impl std::fmt::Debug for PlannerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for PlannerStage {
    fn id(&self) -> StageId {
        StageId::Planner
    }

    async fn process(&self, ctx: &RunContext) -> Result<StageOutput, StageError> {
        let prompt = ctx.require_prompt(self.id())?;
        let stats = ctx.require_analysis(self.id())?;
        let stats_json = serde_json::to_string_pretty(stats).unwrap_or_default();

        let request = Self::build_request(&stats_json, prompt);
        let plan = self
            .reasoner
            .complete(&request)
            .await
            .map_err(|e| StageError::from_error(self.id(), &e))?;

        tracing::debug!(chars = plan.len(), "Plan received");
        Ok(StageOutput::Plan(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, RepoflowError};
    use crate::stages::RepositoryStats;
    use crate::testing::ScriptedReasoner;

    fn ctx_with_stats(prompt: Option<&str>) -> RunContext {
        let mut ctx = RunContext::new("/tmp/repo", prompt.map(String::from));
        ctx.record(StageOutput::Analysis(RepositoryStats {
            repository_name: "repo".into(),
            total_files: 3,
            ..RepositoryStats::default()
        }))
        .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_plan_is_returned_verbatim() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok("1. Read main.rs\n2. Add flag".into())]));
        let stage = PlannerStage::new(reasoner.clone());

        let output = stage.process(&ctx_with_stats(Some("add a --verbose flag"))).await.unwrap();
        assert_eq!(output, StageOutput::Plan("1. Read main.rs\n2. Add flag".into()));

        let requests = reasoner.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user_text().contains("add a --verbose flag"));
        assert!(requests[0].user_text().contains("\"total_files\": 3"));
        assert!(!requests[0].expect_json);
    }

    #[tokio::test]
    async fn test_empty_plan_is_still_a_plan() {
        let stage = PlannerStage::new(Arc::new(ScriptedReasoner::new(vec![Ok(String::new())])));
        let output = stage.process(&ctx_with_stats(Some("refactor"))).await.unwrap();
        assert_eq!(output, StageOutput::Plan(String::new()));
    }

    #[tokio::test]
    async fn test_requires_analysis() {
        let stage = PlannerStage::new(Arc::new(ScriptedReasoner::new(vec![])));
        let ctx = RunContext::new("/tmp/repo", Some("refactor".into()));
        let err = stage.process(&ctx).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailure);
    }

    #[tokio::test]
    async fn test_reasoning_failure_is_classified() {
        let stage = PlannerStage::new(Arc::new(ScriptedReasoner::new(vec![Err(RepoflowError::Timeout {
            operation: "planner reasoning call".into(),
            after_ms: 100,
        })])));
        let err = stage.process(&ctx_with_stats(Some("refactor"))).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.retryable);
    }
}
