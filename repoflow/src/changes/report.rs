//! Aggregate results of apply and revert batches.

use super::diff::Patch;
use crate::core::BatchStatus;
use crate::errors::{FileError, RepoflowError};
use serde::{Deserialize, Serialize};

/// A backup copy written before a file was overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Repository-relative path of the live file.
    pub path: String,
    /// Repository-relative path of the backup copy.
    pub backup_path: String,
}

/// Result of applying a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Three-way aggregate status.
    pub status: BatchStatus,
    /// Paths written successfully, in change-set order.
    pub modified_files: Vec<String>,
    /// One entry per file that failed.
    pub errors: Vec<FileError>,
    /// One patch per file written.
    pub patches: Vec<Patch>,
    /// Backups created for files that already existed.
    pub backups: Vec<BackupRecord>,
}

impl ApplyReport {
    pub(crate) fn finish(
        modified_files: Vec<String>,
        errors: Vec<FileError>,
        patches: Vec<Patch>,
        backups: Vec<BackupRecord>,
    ) -> Self {
        Self {
            status: BatchStatus::from_counts(modified_files.len(), errors.len()),
            modified_files,
            errors,
            patches,
            backups,
        }
    }

    /// Returns true if every file was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts a batch with any failed file into a `PartialFailure` error.
    pub fn into_result(self) -> Result<Self, RepoflowError> {
        batch_result(self.modified_files.len(), self.errors.len())?;
        Ok(self)
    }
}

/// Result of reverting files from backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertReport {
    /// Three-way aggregate status.
    pub status: BatchStatus,
    /// Paths restored from backup, in request order.
    pub reverted_files: Vec<String>,
    /// One entry per path that could not be restored.
    pub errors: Vec<FileError>,
}

impl RevertReport {
    pub(crate) fn finish(reverted_files: Vec<String>, errors: Vec<FileError>) -> Self {
        Self {
            status: BatchStatus::from_counts(reverted_files.len(), errors.len()),
            reverted_files,
            errors,
        }
    }

    /// Returns true if every path was restored.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts a batch with any failed path into a `PartialFailure` error.
    pub fn into_result(self) -> Result<Self, RepoflowError> {
        batch_result(self.reverted_files.len(), self.errors.len())?;
        Ok(self)
    }
}

fn batch_result(succeeded: usize, failed: usize) -> Result<(), RepoflowError> {
    if failed == 0 {
        Ok(())
    } else {
        Err(RepoflowError::PartialFailure { succeeded, failed })
    }
}
