//! Repository access: locking, handles and the uploads directory provider.

mod lock;

pub use lock::RepositoryLocks;

use crate::changes::ChangeService;
use crate::errors::RepoflowError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// A repository root together with the lock registry that guards it.
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    root: PathBuf,
    locks: Arc<RepositoryLocks>,
}

impl RepositoryHandle {
    /// Creates a handle sharing `locks` with other callers.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, locks: Arc<RepositoryLocks>) -> Self {
        Self {
            root: root.into(),
            locks,
        }
    }

    /// Creates a handle with a private lock registry.
    #[must_use]
    pub fn unshared(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(RepositoryLocks::new()))
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Waits for the repository's exclusive section.
    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        self.locks.acquire(&self.root).await
    }

    /// Change operations for this repository, sharing the same locks.
    #[must_use]
    pub fn changes(&self) -> ChangeService {
        ChangeService::new(self.root.clone(), self.locks.clone())
    }
}

/// Lists repository directories under `uploads_dir`, sorted by name.
///
/// A missing uploads directory yields an empty list.
///
/// # Errors
///
/// Returns an IO error if the directory exists but cannot be read.
pub fn list_repositories(uploads_dir: &Path) -> Result<Vec<String>, RepoflowError> {
    if !uploads_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(uploads_dir)
        .map_err(|e| RepoflowError::io(format!("listing {}", uploads_dir.display()), e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RepoflowError::io(format!("listing {}", uploads_dir.display()), e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Resolves a repository given by name (under `uploads_dir`) or by path.
///
/// # Errors
///
/// Returns `NotFound` if neither interpretation names an existing directory.
pub fn resolve_repository(uploads_dir: &Path, name_or_path: &str) -> Result<PathBuf, RepoflowError> {
    let direct = PathBuf::from(name_or_path);
    let candidates = [uploads_dir.join(name_or_path), direct];

    candidates
        .iter()
        .find(|c| c.is_dir())
        .and_then(|c| c.canonicalize().ok())
        .ok_or_else(|| RepoflowError::NotFound(format!("repository '{name_or_path}'")))
}
