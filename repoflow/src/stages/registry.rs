//! Stage registry: maps each stage kind to a factory.

use super::{
    CodeReaderStage, ModifierStage, PlannerStage, RepositoryAnalysisStage, Stage, StageId,
};
use crate::errors::RepoflowError;
use crate::reasoning::Reasoner;
use crate::repository::RepositoryHandle;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Shared collaborators handed to stage factories.
#[derive(Clone)]
pub struct StageDeps {
    /// Reasoning capability used by the planner and modifier.
    pub reasoner: Arc<dyn Reasoner>,
}

impl StageDeps {
    /// Creates dependencies around `reasoner`.
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }
}

impl fmt::Debug for StageDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDeps").finish_non_exhaustive()
    }
}

/// Builds a stage instance for one run.
pub type StageFactory = Box<
    dyn Fn(&StageDeps, Option<&RepositoryHandle>) -> Result<Arc<dyn Stage>, RepoflowError> + Send + Sync,
>;

/// Registry of stage factories keyed by [`StageId`].
///
/// Stage instances are created per run, so stages hold no state across runs.
pub struct StageRegistry {
    factories: HashMap<StageId, StageFactory>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the four built-in stages.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .with(StageId::RepositoryAnalysis, |_, handle| {
                Ok(Arc::new(RepositoryAnalysisStage::new(handle.cloned())) as Arc<dyn Stage>)
            })
            .with(StageId::CodeReader, |_, handle| {
                Ok(Arc::new(CodeReaderStage::new(handle.cloned())) as Arc<dyn Stage>)
            })
            .with(StageId::Planner, |deps, _| {
                Ok(Arc::new(PlannerStage::new(deps.reasoner.clone())) as Arc<dyn Stage>)
            })
            .with(StageId::Modifier, |deps, handle| {
                let handle = handle.ok_or_else(|| {
                    RepoflowError::Config("the modifier stage requires a repository handle".into())
                })?;
                Ok(Arc::new(ModifierStage::new(deps.reasoner.clone(), handle.clone())) as Arc<dyn Stage>)
            })
    }

    /// Registers or replaces the factory for `id`.
    pub fn register<F>(&mut self, id: StageId, factory: F)
    where
        F: Fn(&StageDeps, Option<&RepositoryHandle>) -> Result<Arc<dyn Stage>, RepoflowError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id, Box::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, id: StageId, factory: F) -> Self
    where
        F: Fn(&StageDeps, Option<&RepositoryHandle>) -> Result<Arc<dyn Stage>, RepoflowError>
            + Send
            + Sync
            + 'static,
    {
        self.register(id, factory);
        self
    }

    /// Returns true if `id` has a factory.
    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.factories.contains_key(&id)
    }

    /// Builds the stage for `id`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `id` is not registered or the factory
    /// is missing a collaborator.
    pub fn build(
        &self,
        id: StageId,
        deps: &StageDeps,
        handle: Option<&RepositoryHandle>,
    ) -> Result<Arc<dyn Stage>, RepoflowError> {
        let factory = self
            .factories
            .get(&id)
            .ok_or_else(|| RepoflowError::Config(format!("no stage registered for '{id}'")))?;
        factory(deps, handle)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("StageRegistry").field("stages", &ids).finish()
    }
}
