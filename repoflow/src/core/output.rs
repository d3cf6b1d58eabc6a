//! Typed stage output.

use crate::stages::{CodeBlob, ModificationOutcome, RepositoryStats, StageId};
use serde::{Deserialize, Serialize};

/// The output of a successful stage execution.
///
/// Each variant is produced by exactly one stage kind, which makes that stage
/// the designated producer of the matching context field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum StageOutput {
    /// Repository statistics from the analysis stage.
    Analysis(RepositoryStats),
    /// Aggregated source text from the code reader.
    Code(CodeBlob),
    /// Investigation plan text from the planner.
    Plan(String),
    /// Explanation and applied changes from the modifier.
    Modification(ModificationOutcome),
}

impl StageOutput {
    /// Returns the stage kind that produces this output.
    #[must_use]
    pub fn producer(&self) -> StageId {
        match self {
            Self::Analysis(_) => StageId::RepositoryAnalysis,
            Self::Code(_) => StageId::CodeReader,
            Self::Plan(_) => StageId::Planner,
            Self::Modification(_) => StageId::Modifier,
        }
    }

    /// Returns the context field this output is recorded under.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Analysis(_) => "results",
            Self::Code(_) => "code_contents",
            Self::Plan(_) => "plan",
            Self::Modification(_) => "response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_producer_and_field() {
        let plan = StageOutput::Plan("1. read main.rs".into());
        assert_eq!(plan.producer(), StageId::Planner);
        assert_eq!(plan.field(), "plan");

        let stats = StageOutput::Analysis(RepositoryStats::default());
        assert_eq!(stats.producer(), StageId::RepositoryAnalysis);
        assert_eq!(stats.field(), "results");
    }

    #[test]
    fn test_output_serialization_is_tagged() {
        let json = serde_json::to_value(StageOutput::Plan("step".into())).unwrap();
        assert_eq!(json["kind"], "plan");
        assert_eq!(json["value"], "step");
    }
}
