//! Per-repository exclusive sections.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Named mutexes keyed by canonical repository path.
///
/// Entries nobody holds or waits on are pruned on the next acquisition, so the
/// map only tracks repositories with callers in flight.
///
/// Paths that cannot be canonicalized (for example a root that no longer
/// exists) are keyed as given.
#[derive(Debug, Default)]
pub struct RepositoryLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl RepositoryLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }

    /// Waits for exclusive access to the repository at `path`.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let key = Self::key(path);
        self.prune();
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        tracing::trace!(repository = %key.display(), "Acquiring repository lock");
        mutex.lock_owned().await
    }

    /// Drops entries whose mutex is referenced only by the map.
    ///
    /// A holder or waiter keeps its own clone of the mutex, so a pruned entry
    /// was idle and re-creating it later is equivalent.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of repositories currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no repository is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_repository_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let locks = RepositoryLocks::new();

        let guard = locks.acquire(dir.path()).await;
        let dotted = dir.path().join(".");
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&dotted)).await;
        assert!(second.is_err(), "aliased path must map to the same lock");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(500), locks.acquire(dir.path())).await;
        assert!(third.is_ok());
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_different_repositories_do_not_block() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let locks = RepositoryLocks::new();

        let _a = locks.acquire(a.path()).await;
        let other = tokio::time::timeout(Duration::from_millis(500), locks.acquire(b.path())).await;
        assert!(other.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let locks = RepositoryLocks::new();

        drop(locks.acquire(a.path()).await);
        let guard = locks.acquire(b.path()).await;
        assert_eq!(locks.len(), 1);

        locks.prune();
        assert_eq!(locks.len(), 1, "held lock must survive pruning");

        drop(guard);
        locks.prune();
        assert!(locks.is_empty());
    }
}
