//! The append-only record threaded through one pipeline run.

use super::RunIdentity;
use crate::core::StageOutput;
use crate::errors::{DataConflictError, StageError};
use crate::selector::SelectionDecision;
use crate::stages::{CodeBlob, ModificationOutcome, RepositoryStats, StageId};
use std::path::{Path, PathBuf};

/// Accumulated state of a single orchestrator invocation.
///
/// Each optional field has exactly one producing stage. Once a field is set it
/// cannot be overwritten; a second write yields a [`DataConflictError`].
#[derive(Debug, Clone)]
pub struct RunContext {
    identity: RunIdentity,
    repo_root: PathBuf,
    prompt: Option<String>,
    selection: Option<SelectionDecision>,
    analysis: Option<RepositoryStats>,
    code: Option<CodeBlob>,
    plan: Option<String>,
    modification: Option<ModificationOutcome>,
}

impl RunContext {
    /// Creates a new context for a repository and optional prompt.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>, prompt: Option<String>) -> Self {
        Self {
            identity: RunIdentity::new(),
            repo_root: repo_root.into(),
            prompt,
            selection: None,
            analysis: None,
            code: None,
            plan: None,
            modification: None,
        }
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the repository root.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Returns the caller's prompt, if one was supplied.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Returns the selector decision, if selection occurred.
    #[must_use]
    pub fn selection(&self) -> Option<&SelectionDecision> {
        self.selection.as_ref()
    }

    /// Returns the analysis statistics, if produced.
    #[must_use]
    pub fn analysis(&self) -> Option<&RepositoryStats> {
        self.analysis.as_ref()
    }

    /// Returns the aggregated code, if produced.
    #[must_use]
    pub fn code(&self) -> Option<&CodeBlob> {
        self.code.as_ref()
    }

    /// Returns the plan text, if produced.
    #[must_use]
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// Returns the modification outcome, if produced.
    #[must_use]
    pub fn modification(&self) -> Option<&ModificationOutcome> {
        self.modification.as_ref()
    }

    /// Returns the prompt or a missing-input error for `stage`.
    pub fn require_prompt(&self, stage: StageId) -> Result<&str, StageError> {
        self.prompt().ok_or_else(|| StageError::missing_input(stage, "prompt"))
    }

    /// Returns the analysis or a missing-input error for `stage`.
    pub fn require_analysis(&self, stage: StageId) -> Result<&RepositoryStats, StageError> {
        self.analysis().ok_or_else(|| StageError::missing_input(stage, "results"))
    }

    /// Returns the code blob or a missing-input error for `stage`.
    pub fn require_code(&self, stage: StageId) -> Result<&CodeBlob, StageError> {
        self.code().ok_or_else(|| StageError::missing_input(stage, "code_contents"))
    }

    /// Records the selector decision.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if a decision was already recorded.
    pub fn record_selection(&mut self, decision: SelectionDecision) -> Result<(), DataConflictError> {
        set_once(&mut self.selection, decision, "selection")
    }

    /// Records a stage output under its designated field.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the field was already written.
    pub fn record(&mut self, output: StageOutput) -> Result<(), DataConflictError> {
        let field = output.field();
        match output {
            StageOutput::Analysis(stats) => set_once(&mut self.analysis, stats, field),
            StageOutput::Code(code) => set_once(&mut self.code, code, field),
            StageOutput::Plan(plan) => set_once(&mut self.plan, plan, field),
            StageOutput::Modification(outcome) => set_once(&mut self.modification, outcome, field),
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &str) -> Result<(), DataConflictError> {
    if slot.is_some() {
        return Err(DataConflictError::new(key));
    }
    *slot = Some(value);
    Ok(())
}
