//! Backup, write and revert of files inside one repository.

use super::diff::{unified_diff, Patch};
use super::paths::{ensure_contained, resolve_within};
use super::report::{ApplyReport, BackupRecord, RevertReport};
use super::set::{ChangeSet, FileChange};
use super::BACKUP_DIR_NAME;
use crate::errors::{FileError, PathEscapeError, RepoflowError};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

fn display_rel(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Applies change sets and reverts files for a single repository root.
///
/// Operations are synchronous and unlocked; use
/// [`ChangeService`](super::ChangeService) when other callers may touch the
/// same repository concurrently.
#[derive(Debug, Clone)]
pub struct ChangeManager {
    root: PathBuf,
    backup_dir: PathBuf,
}

impl ChangeManager {
    /// Creates a manager for `root`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the root does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, RepoflowError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|_| RepoflowError::NotFound(format!("repository {}", root.display())))?;
        if !canonical.is_dir() {
            return Err(RepoflowError::NotFound(format!(
                "repository {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            backup_dir: canonical.join(BACKUP_DIR_NAME),
            root: canonical,
        })
    }

    /// Canonical repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding backup copies.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Applies every change in order, isolating failures per file.
    pub fn apply(&self, changes: &ChangeSet) -> ApplyReport {
        let mut modified = Vec::new();
        let mut errors = Vec::new();
        let mut patches = Vec::new();
        let mut backups = Vec::new();

        for change in changes.iter() {
            match self.apply_one(change) {
                Ok((patch, backup)) => {
                    tracing::debug!(path = %change.path, backup = backup.is_some(), "Applied change");
                    modified.push(change.path.clone());
                    patches.push(patch);
                    backups.extend(backup);
                }
                Err(e) => {
                    tracing::warn!(path = %change.path, error = %e, "Failed to apply change");
                    errors.push(FileError::new(&change.path, &e));
                }
            }
        }

        let report = ApplyReport::finish(modified, errors, patches, backups);
        tracing::info!(
            root = %self.root.display(),
            status = %report.status,
            modified = report.modified_files.len(),
            failed = report.errors.len(),
            "Change set applied"
        );
        report
    }

    fn apply_one(&self, change: &FileChange) -> Result<(Patch, Option<BackupRecord>), RepoflowError> {
        let (relative, target) = resolve_within(&self.root, &change.path)?;

        let (previous, backup) = if target.exists() {
            let bytes = fs::read(&target)
                .map_err(|e| RepoflowError::io(format!("reading {}", change.path), e))?;
            let backup = self.write_backup(&relative, &bytes)?;
            (String::from_utf8_lossy(&bytes).into_owned(), Some(backup))
        } else {
            (String::new(), None)
        };

        let patch = unified_diff(&change.path, &previous, &change.content);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RepoflowError::io(format!("creating parent of {}", change.path), e))?;
        }
        fs::write(&target, &change.content)
            .map_err(|e| RepoflowError::io(format!("writing {}", change.path), e))?;

        Ok((patch, backup))
    }

    /// Rejects backup locations that leave the repository's own backup area.
    fn check_backup_path(&self, backup_path: &Path, requested: &str) -> Result<(), RepoflowError> {
        if fs::symlink_metadata(&self.backup_dir).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(PathEscapeError::new(requested, "the backup area is a symlink").into());
        }
        let relative = backup_path.strip_prefix(&self.root).unwrap_or(backup_path);
        ensure_contained(&self.root, relative, requested)?;
        Ok(())
    }

    fn write_backup(&self, relative: &Path, bytes: &[u8]) -> Result<BackupRecord, RepoflowError> {
        let backup_path = self.next_backup_path(relative);
        self.check_backup_path(&backup_path, &display_rel(relative))?;
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RepoflowError::io("creating backup directory", e))?;
        }
        fs::write(&backup_path, bytes).map_err(|e| {
            RepoflowError::io(format!("writing backup of {}", display_rel(relative)), e)
        })?;

        let backup_rel = backup_path
            .strip_prefix(&self.root)
            .map(display_rel)
            .unwrap_or_else(|_| backup_path.display().to_string());
        Ok(BackupRecord {
            path: display_rel(relative),
            backup_path: backup_rel,
        })
    }

    /// Canonical backup location if free, else a timestamped sibling.
    fn next_backup_path(&self, relative: &Path) -> PathBuf {
        let canonical = self.backup_dir.join(relative);
        if !canonical.exists() {
            return canonical;
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let stamped = PathBuf::from(format!("{}.{stamp}", canonical.display()));
        if !stamped.exists() {
            return stamped;
        }

        (1u32..)
            .map(|n| PathBuf::from(format!("{}_{n}", stamped.display())))
            .find(|candidate| !candidate.exists())
            .unwrap_or(stamped)
    }

    /// Restores each path from its canonical backup, isolating failures per path.
    pub fn revert(&self, paths: &[String]) -> RevertReport {
        let mut reverted = Vec::new();
        let mut errors = Vec::new();

        for path in paths {
            match self.revert_one(path) {
                Ok(()) => {
                    tracing::debug!(path = %path, "Reverted file");
                    reverted.push(path.clone());
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to revert file");
                    errors.push(FileError::new(path, &e));
                }
            }
        }

        let report = RevertReport::finish(reverted, errors);
        tracing::info!(
            root = %self.root.display(),
            status = %report.status,
            reverted = report.reverted_files.len(),
            failed = report.errors.len(),
            "Revert finished"
        );
        report
    }

    fn revert_one(&self, path: &str) -> Result<(), RepoflowError> {
        let (relative, target) = resolve_within(&self.root, path)?;
        let backup = self.backup_dir.join(&relative);
        self.check_backup_path(&backup, path)?;
        if !backup.is_file() {
            return Err(RepoflowError::NotFound(format!("No backup found for {path}")));
        }

        let bytes = fs::read(&backup)
            .map_err(|e| RepoflowError::io(format!("reading backup of {path}"), e))?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RepoflowError::io(format!("creating parent of {path}"), e))?;
        }
        fs::write(&target, bytes).map_err(|e| RepoflowError::io(format!("restoring {path}"), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchStatus;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    fn repo() -> (tempfile::TempDir, ChangeManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = ChangeManager::new(dir.path()).unwrap();
        (dir, manager)
    }

    fn read(manager: &ChangeManager, rel: &str) -> String {
        fs::read_to_string(manager.root().join(rel)).unwrap()
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChangeManager::new(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_change_set_is_success() {
        let (_dir, manager) = repo();
        let report = manager.apply(&ChangeSet::new());
        assert_eq!(report.status, BatchStatus::Success);
        assert!(report.modified_files.is_empty());
        assert!(report.patches.is_empty());
        assert!(!manager.backup_dir().exists());
    }

    #[test]
    fn test_new_file_is_created_without_backup() {
        let (_dir, manager) = repo();
        let report = manager.apply(&ChangeSet::new().with("a.txt", "X"));

        assert_eq!(report.status, BatchStatus::Success);
        assert_eq!(report.modified_files, vec!["a.txt".to_string()]);
        assert_eq!(read(&manager, "a.txt"), "X");
        assert!(report.backups.is_empty());
        assert!(!manager.backup_dir().join("a.txt").exists());

        let diff = &report.patches[0].diff;
        assert!(diff.lines().any(|l| l == "+X"));
        assert!(!diff.lines().any(|l| l.starts_with('-') && !l.starts_with("---")));
    }

    #[test]
    fn test_overwrite_backs_up_and_reverts() {
        let (_dir, manager) = repo();
        fs::write(manager.root().join("a.txt"), "X").unwrap();

        let report = manager.apply(&ChangeSet::new().with("a.txt", "Y"));
        assert_eq!(report.status, BatchStatus::Success);
        assert_eq!(read(&manager, "a.txt"), "Y");
        assert_eq!(fs::read_to_string(manager.backup_dir().join("a.txt")).unwrap(), "X");
        assert_eq!(
            report.backups,
            vec![BackupRecord {
                path: "a.txt".into(),
                backup_path: ".code_backup/a.txt".into(),
            }]
        );

        let diff = &report.patches[0].diff;
        assert!(diff.lines().any(|l| l == "-X"));
        assert!(diff.lines().any(|l| l == "+Y"));

        let revert = manager.revert(&["a.txt".to_string()]);
        assert_eq!(revert.status, BatchStatus::Success);
        assert_eq!(read(&manager, "a.txt"), "X");
    }

    #[test]
    fn test_nested_paths_create_parents() {
        let (_dir, manager) = repo();
        fs::create_dir_all(manager.root().join("src")).unwrap();
        fs::write(manager.root().join("src/lib.rs"), "old").unwrap();

        let report = manager.apply(&ChangeSet::new().with("src/lib.rs", "new").with("docs/guide/intro.md", "# Intro"));
        assert_eq!(report.status, BatchStatus::Success);
        assert_eq!(read(&manager, "docs/guide/intro.md"), "# Intro");
        assert_eq!(fs::read_to_string(manager.backup_dir().join("src/lib.rs")).unwrap(), "old");
    }

    #[test]
    fn test_escaping_path_is_isolated() {
        let (dir, manager) = repo();
        let report = manager.apply(&ChangeSet::new().with("../../etc/x", "evil").with("ok.txt", "fine"));

        assert_eq!(report.status, BatchStatus::PartialSuccess);
        assert_eq!(report.modified_files, vec!["ok.txt".to_string()]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "../../etc/x");
        assert_eq!(report.errors[0].kind, ErrorKind::ValidationFailure);
        assert!(!dir.path().parent().unwrap().join("etc").exists());
        assert_eq!(report.patches.len(), 1);
    }

    #[test]
    fn test_all_rejected_is_error() {
        let (_dir, manager) = repo();
        let report = manager.apply(&ChangeSet::new().with("/abs/path", "x").with(".code_backup/a.txt", "y"));
        assert_eq!(report.status, BatchStatus::Error);
        assert_eq!(report.errors.len(), 2);
        assert!(report.modified_files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        let (_dir, manager) = repo();
        std::os::unix::fs::symlink(outside.path(), manager.root().join("out")).unwrap();

        let report = manager.apply(&ChangeSet::new().with("out/pwned.txt", "x"));
        assert_eq!(report.status, BatchStatus::Error);
        assert!(!outside.path().join("pwned.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_target_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        let (_dir, manager) = repo();
        let escaped = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&escaped, manager.root().join("link.txt")).unwrap();

        let report = manager.apply(&ChangeSet::new().with("link.txt", "evil").with("ok.txt", "fine"));
        assert_eq!(report.status, BatchStatus::PartialSuccess);
        assert_eq!(report.modified_files, vec!["ok.txt".to_string()]);
        assert_eq!(report.errors[0].kind, ErrorKind::ValidationFailure);
        assert!(!escaped.exists());

        let revert = manager.revert(&["link.txt".to_string()]);
        assert_eq!(revert.status, BatchStatus::Error);
        assert!(!escaped.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_backup_area_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        let (_dir, manager) = repo();
        fs::write(manager.root().join("secret.txt"), "S").unwrap();
        std::os::unix::fs::symlink(outside.path(), manager.backup_dir()).unwrap();

        let report = manager.apply(&ChangeSet::new().with("secret.txt", "new"));
        assert_eq!(report.status, BatchStatus::Error);
        assert_eq!(report.errors[0].kind, ErrorKind::ValidationFailure);
        assert!(report.errors[0].message.contains("backup area"));
        assert!(!outside.path().join("secret.txt").exists());
        assert_eq!(read(&manager, "secret.txt"), "S");

        fs::write(outside.path().join("secret.txt"), "planted").unwrap();
        let revert = manager.revert(&["secret.txt".to_string()]);
        assert_eq!(revert.status, BatchStatus::Error);
        assert_eq!(read(&manager, "secret.txt"), "S");
    }

    #[test]
    fn test_second_backup_is_timestamped() {
        let (_dir, manager) = repo();
        fs::write(manager.root().join("a.txt"), "v1").unwrap();

        manager.apply(&ChangeSet::new().with("a.txt", "v2"));
        let second = manager.apply(&ChangeSet::new().with("a.txt", "v3"));

        assert_eq!(fs::read_to_string(manager.backup_dir().join("a.txt")).unwrap(), "v1");
        let stamped = &second.backups[0].backup_path;
        assert!(stamped.starts_with(".code_backup/a.txt."), "{stamped}");
        assert_eq!(fs::read_to_string(manager.root().join(stamped)).unwrap(), "v2");

        let third = manager.apply(&ChangeSet::new().with("a.txt", "v4"));
        assert_ne!(&third.backups[0].backup_path, stamped);
        assert_eq!(fs::read_to_string(manager.root().join(&third.backups[0].backup_path)).unwrap(), "v3");
    }

    #[test]
    fn test_revert_without_backup_is_isolated() {
        let (_dir, manager) = repo();
        fs::write(manager.root().join("a.txt"), "X").unwrap();
        manager.apply(&ChangeSet::new().with("a.txt", "Y"));

        let report = manager.revert(&["missing.txt".to_string(), "a.txt".to_string()]);
        assert_eq!(report.status, BatchStatus::PartialSuccess);
        assert_eq!(report.reverted_files, vec!["a.txt".to_string()]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "missing.txt");
        assert_eq!(report.errors[0].kind, ErrorKind::NotFound);
        assert!(report.errors[0].message.contains("No backup found for missing.txt"));
        assert_eq!(read(&manager, "a.txt"), "X");
    }

    #[test]
    fn test_revert_all_missing_is_error() {
        let (_dir, manager) = repo();
        let report = manager.revert(&["a".to_string(), "b".to_string()]);
        assert_eq!(report.status, BatchStatus::Error);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_revert_restores_deleted_file() {
        let (_dir, manager) = repo();
        fs::create_dir_all(manager.root().join("pkg")).unwrap();
        fs::write(manager.root().join("pkg/mod.py"), "orig").unwrap();
        manager.apply(&ChangeSet::new().with("pkg/mod.py", "changed"));
        fs::remove_dir_all(manager.root().join("pkg")).unwrap();

        let report = manager.revert(&["pkg/mod.py".to_string()]);
        assert!(report.status.is_success());
        assert_eq!(read(&manager, "pkg/mod.py"), "orig");
    }
}
