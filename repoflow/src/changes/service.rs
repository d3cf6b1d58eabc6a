//! Change operations serialized per repository.

use super::manager::ChangeManager;
use super::report::{ApplyReport, RevertReport};
use super::set::ChangeSet;
use crate::errors::RepoflowError;
use crate::repository::RepositoryLocks;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn join_error(operation: &str, err: tokio::task::JoinError) -> RepoflowError {
    RepoflowError::io(format!("joining {operation} task"), std::io::Error::other(err.to_string()))
}

/// Runs apply and revert inside the repository's exclusive section.
///
/// The lock covers the entire batch; the filesystem work itself runs on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct ChangeService {
    root: PathBuf,
    locks: Arc<RepositoryLocks>,
}

impl ChangeService {
    /// Creates a service for `root` sharing `locks` with other callers.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, locks: Arc<RepositoryLocks>) -> Self {
        Self {
            root: root.into(),
            locks,
        }
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Applies `changes` while holding the repository lock.
    ///
    /// # Errors
    ///
    /// Fails only if the repository root is missing; per-file failures are
    /// reported inside the [`ApplyReport`].
    pub async fn apply(&self, changes: ChangeSet) -> Result<ApplyReport, RepoflowError> {
        let _guard = self.locks.acquire(&self.root).await;
        let manager = ChangeManager::new(&self.root)?;
        tokio::task::spawn_blocking(move || manager.apply(&changes))
            .await
            .map_err(|e| join_error("apply", e))
    }

    /// Reverts `paths` while holding the repository lock.
    ///
    /// # Errors
    ///
    /// Fails only if the repository root is missing.
    pub async fn revert(&self, paths: Vec<String>) -> Result<RevertReport, RepoflowError> {
        let _guard = self.locks.acquire(&self.root).await;
        let manager = ChangeManager::new(&self.root)?;
        tokio::task::spawn_blocking(move || manager.revert(&paths))
            .await
            .map_err(|e| join_error("revert", e))
    }
}
