//! Modifier stage: answers the prompt and applies proposed file changes.

use super::{Stage, StageId};
use crate::changes::{diff_summary, ApplyReport, ChangeSet};
use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::{RepoflowError, StageError};
use crate::reasoning::{parse_structured, Reasoner, ReasoningRequest};
use crate::repository::RepositoryHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MODIFIER_SYSTEM: &str = "You are an expert software engineer working on a code repository. \
Answer the user's request using the code provided. If the request requires changing code, propose \
the complete new content of every file you change.\n\n\
Respond with a single JSON object with exactly two fields:\n\
- \"explanation\": a string answering the request and describing any changes\n\
- \"changes\": an object mapping repository-relative file paths to their full new content \
(use an empty object when no files change)\n\
Paths must stay inside the repository. Do not include any text outside the JSON object.";

/// The structured response the modifier expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationResponse {
    /// Answer to the prompt.
    pub explanation: String,
    /// Proposed file writes.
    pub changes: ChangeSet,
}

/// Output of the modifier stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationOutcome {
    /// Answer to the prompt.
    pub explanation: String,
    /// Apply result, present when changes were proposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply: Option<ApplyReport>,
    /// Human-readable diff text for the applied changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,
}

impl ModificationOutcome {
    /// Returns true if any file was written.
    #[must_use]
    pub fn changed_files(&self) -> bool {
        self.apply.as_ref().is_some_and(|r| !r.modified_files.is_empty())
    }
}

/// Stage that asks for an explanation plus a change set and applies it.
pub struct ModifierStage {
    reasoner: Arc<dyn Reasoner>,
    handle: RepositoryHandle,
}

impl ModifierStage {
    /// Creates a modifier writing into the repository behind `handle`.
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>, handle: RepositoryHandle) -> Self {
        Self { reasoner, handle }
    }

    /// Builds the modification request.
    #[must_use]
    pub fn build_request(code: &str, prompt: &str, plan: Option<&str>) -> ReasoningRequest {
        let mut body = format!("User request: \"{prompt}\"\n\n");
        if let Some(plan) = plan.filter(|p| !p.trim().is_empty()) {
            body.push_str("Investigation plan:\n");
            body.push_str(plan);
            body.push_str("\n\n");
        }
        body.push_str("Repository code:\n");
        body.push_str(code);

        ReasoningRequest::new("modifier")
            .system(MODIFIER_SYSTEM)
            .user(body)
            .with_temperature(0.2)
            .expecting_json()
    }

    /// Parses the raw response into explanation and change set.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if either field is missing or mistyped.
    pub fn parse_response(raw: &str) -> Result<ModificationResponse, RepoflowError> {
        Ok(parse_structured(raw, "modifier")?)
    }
}

impl std::fmt::Debug for ModifierStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifierStage")
            .field("root", &self.handle.root())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ModifierStage {
    fn id(&self) -> StageId {
        StageId::Modifier
    }

    async fn process(&self, ctx: &RunContext) -> Result<StageOutput, StageError> {
        let prompt = ctx.require_prompt(self.id())?;
        let code = ctx.require_code(self.id())?;

        let request = Self::build_request(&code.text, prompt, ctx.plan());
        let raw = self
            .reasoner
            .complete(&request)
            .await
            .map_err(|e| StageError::from_error(self.id(), &e))?;

        let response = Self::parse_response(&raw).map_err(|e| StageError::from_error(self.id(), &e))?;

        let mut outcome = ModificationOutcome {
            explanation: response.explanation,
            ..ModificationOutcome::default()
        };

        if !response.changes.is_empty() {
            tracing::info!(files = response.changes.len(), "Applying proposed changes");
            let report = self
                .handle
                .changes()
                .apply(response.changes)
                .await
                .map_err(|e| StageError::from_error(self.id(), &e))?;
            outcome.diff_summary = Some(diff_summary(&report.patches));
            outcome.apply = Some(report);
        }

        Ok(StageOutput::Modification(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchStatus;
    use crate::errors::ErrorKind;
    use crate::stages::CodeBlob;
    use crate::testing::ScriptedReasoner;
    use std::fs;

    fn ctx_for(root: &std::path::Path, plan: Option<&str>) -> RunContext {
        let mut ctx = RunContext::new(root, Some("rename greet to hello".into()));
        ctx.record(StageOutput::Code(CodeBlob {
            text: "\n--- File: lib.rs ---\npub fn greet() {}\n".into(),
            files_read: vec!["lib.rs".into()],
            read_errors: vec![],
        }))
        .unwrap();
        if let Some(plan) = plan {
            ctx.record(StageOutput::Plan(plan.into())).unwrap();
        }
        ctx
    }

    #[test]
    fn test_request_includes_plan_when_present() {
        let with_plan = ModifierStage::build_request("CODE", "do it", Some("1. step"));
        assert!(with_plan.expect_json);
        assert!(with_plan.user_text().contains("Investigation plan:\n1. step"));
        assert!(with_plan.user_text().contains("CODE"));

        let without = ModifierStage::build_request("CODE", "do it", None);
        assert!(!without.user_text().contains("Investigation plan"));
    }

    #[test]
    fn test_parse_response_requires_both_fields() {
        let ok = ModifierStage::parse_response(r#"{"explanation": "done", "changes": {"a.rs": "x"}}"#).unwrap();
        assert_eq!(ok.changes.paths(), vec!["a.rs"]);

        for bad in [
            r#"{"explanation": "no changes field"}"#,
            r#"{"changes": {}}"#,
            r#"{"explanation": "x", "changes": ["a.rs"]}"#,
            "Sure! Here is the change.",
            "[]",
        ] {
            let err = ModifierStage::parse_response(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailure, "{bad}");
            assert!(!err.is_retryable());
        }
    }

    #[tokio::test]
    async fn test_explanation_only_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(
            r#"{"explanation": "greet prints nothing", "changes": {}}"#.into(),
        )]));
        let stage = ModifierStage::new(reasoner, RepositoryHandle::unshared(dir.path()));

        let output = stage.process(&ctx_for(dir.path(), None)).await.unwrap();
        let StageOutput::Modification(outcome) = output else {
            panic!("expected modification output");
        };
        assert_eq!(outcome.explanation, "greet prints nothing");
        assert!(outcome.apply.is_none());
        assert!(!outcome.changed_files());
        assert!(!dir.path().join(".code_backup").exists());
    }

    #[tokio::test]
    async fn test_changes_are_applied_with_diff() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lib.rs"), "pub fn greet() {}\n").unwrap();
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(
            "```json\n{\"explanation\": \"renamed\", \"changes\": {\"lib.rs\": \"pub fn hello() {}\\n\"}}\n```".into(),
        )]));
        let stage = ModifierStage::new(reasoner.clone(), RepositoryHandle::unshared(dir.path()));

        let output = stage.process(&ctx_for(dir.path(), Some("1. rename"))).await.unwrap();
        let StageOutput::Modification(outcome) = output else {
            panic!("expected modification output");
        };

        let report = outcome.apply.as_ref().unwrap();
        assert_eq!(report.status, BatchStatus::Success);
        assert_eq!(fs::read_to_string(dir.path().join("lib.rs")).unwrap(), "pub fn hello() {}\n");
        let summary = outcome.diff_summary.as_deref().unwrap();
        assert!(summary.contains("File: lib.rs"));
        assert!(summary.contains("-pub fn greet() {}"));
        assert!(summary.contains("+pub fn hello() {}"));
        assert!(reasoner.requests()[0].user_text().contains("1. rename"));
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok("I changed the files for you.".into())]));
        let stage = ModifierStage::new(reasoner.clone(), RepositoryHandle::unshared(dir.path()));

        let err = stage.process(&ctx_for(dir.path(), None)).await.unwrap_err();
        assert_eq!(err.stage, StageId::Modifier);
        assert_eq!(err.kind, ErrorKind::ValidationFailure);
        assert!(!err.retryable);
        assert_eq!(reasoner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_requires_code() {
        let dir = tempfile::tempdir().unwrap();
        let stage = ModifierStage::new(
            Arc::new(ScriptedReasoner::new(vec![])),
            RepositoryHandle::unshared(dir.path()),
        );
        let ctx = RunContext::new(dir.path(), Some("x".into()));
        assert_eq!(stage.process(&ctx).await.unwrap_err().kind, ErrorKind::ValidationFailure);
    }
}
