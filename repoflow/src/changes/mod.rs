//! Change Transaction Manager.
//!
//! Turns a proposed [`ChangeSet`] into backed-up, diffed file writes and
//! restores files from backup on request. Backups are append-only and live
//! under [`BACKUP_DIR_NAME`] in the repository root, mirroring relative paths.

mod diff;
mod manager;
mod paths;
mod report;
mod service;
mod set;

pub use diff::{diff_summary, unified_diff, Patch};
pub use manager::ChangeManager;
pub use paths::{normalize_relative, resolve_within};
pub use report::{ApplyReport, BackupRecord, RevertReport};
pub use service::ChangeService;
pub use set::{ChangeSet, FileChange};

/// Name of the backup directory inside each repository root.
pub const BACKUP_DIR_NAME: &str = ".code_backup";
