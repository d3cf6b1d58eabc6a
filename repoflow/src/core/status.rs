//! Batch status and pipeline state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate outcome of a batch file operation.
///
/// This is a three-way status, not a boolean: `PartialSuccess` means the
/// per-item error list must be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every item succeeded (including the empty batch).
    Success,
    /// Some items succeeded and some failed.
    PartialSuccess,
    /// No item succeeded.
    Error,
}

impl BatchStatus {
    /// Derives the aggregate status from per-item counts.
    #[must_use]
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Error,
            _ => Self::PartialSuccess,
        }
    }

    /// Returns true if every item succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialSuccess => write!(f, "partial_success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// State of a single orchestrator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "index")]
pub enum PipelineState {
    /// Nothing has happened yet.
    Idle,
    /// Waiting on the selector's decision.
    SelectionPending,
    /// Running the stage at this position of the decision.
    Executing(usize),
    /// All stages completed.
    Done,
    /// A decision or stage failed.
    Failed,
}

impl PipelineState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::SelectionPending => write!(f, "selection_pending"),
            Self::Executing(i) => write!(f, "executing({i})"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
