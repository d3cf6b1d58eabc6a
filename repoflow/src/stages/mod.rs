//! Stage trait and the four built-in stages.
//!
//! Stages are the units of work the orchestrator composes. Each stage kind
//! reads what earlier stages recorded in the [`RunContext`] and returns one
//! typed [`StageOutput`].

mod analysis;
mod catalog;
mod modifier;
mod planner;
mod reader;
mod registry;

pub use analysis::{analyze_repository, file_type_key, RepositoryAnalysisStage, RepositoryStats};
pub use catalog::{catalog_json, StageDescriptor, StageId, CATALOG};
pub use modifier::{ModificationOutcome, ModificationResponse, ModifierStage};
pub use planner::PlannerStage;
pub use reader::{read_code, CodeBlob, CodeReaderStage, FileReadError, IGNORED_DIRS, SOURCE_EXTENSIONS};
pub use registry::{StageDeps, StageFactory, StageRegistry};

pub use crate::changes::ChangeSet;

use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the kind of this stage.
    fn id(&self) -> StageId;

    /// Executes the stage against the run context.
    ///
    /// # Errors
    ///
    /// Returns a classified [`StageError`]; the orchestrator stops the run on
    /// the first one.
    async fn process(&self, ctx: &RunContext) -> Result<StageOutput, StageError>;
}

/// A stage backed by a closure, mainly for substituting a stage kind.
pub struct FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutput, StageError> + Send + Sync,
{
    id: StageId,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutput, StageError> + Send + Sync,
{
    /// Creates a function-based stage standing in for `id`.
    pub fn new(id: StageId, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutput, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&RunContext) -> Result<StageOutput, StageError> + Send + Sync,
{
    fn id(&self) -> StageId {
        self.id
    }

    async fn process(&self, ctx: &RunContext) -> Result<StageOutput, StageError> {
        (self.func)(ctx)
    }
}
