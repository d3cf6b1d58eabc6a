//! Repository-Analysis stage: file and directory statistics.

use super::{Stage, StageId};
use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::{RepoflowError, StageError};
use crate::repository::RepositoryHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Statistics about a repository snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStats {
    /// Name of the repository root directory.
    pub repository_name: String,
    /// Number of regular files below the root.
    pub total_files: usize,
    /// Number of directories below the root (the root itself excluded).
    pub total_directories: usize,
    /// Extension (with leading dot, empty for none) to file count.
    pub file_types: BTreeMap<String, usize>,
}

/// Returns the file type key for a path: `.ext`, or empty if there is none.
#[must_use]
pub fn file_type_key(path: &Path) -> String {
    match path.extension().map(|e| e.to_string_lossy()) {
        Some(ext) if !ext.is_empty() => format!(".{ext}"),
        _ => String::new(),
    }
}

/// Walks the full tree once and computes statistics.
///
/// # Errors
///
/// Any traversal error fails the whole analysis; no partial statistics are
/// returned.
pub fn analyze_repository(root: &Path) -> Result<RepositoryStats, RepoflowError> {
    let mut stats = RepositoryStats {
        repository_name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ..RepositoryStats::default()
    };

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let context = format!("analyzing repository {}", root.display());
            match e.into_io_error() {
                Some(io) => RepoflowError::io(context, io),
                None => RepoflowError::io(context, std::io::Error::other("filesystem loop detected")),
            }
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            stats.total_directories += 1;
        } else if file_type.is_file() {
            stats.total_files += 1;
            *stats.file_types.entry(file_type_key(entry.path())).or_insert(0) += 1;
        }
    }

    Ok(stats)
}

/// Stage computing [`RepositoryStats`] for the run's repository.
#[derive(Debug, Clone, Default)]
pub struct RepositoryAnalysisStage {
    handle: Option<RepositoryHandle>,
}

impl RepositoryAnalysisStage {
    /// Creates the stage. With a handle, the walk holds the repository lock.
    #[must_use]
    pub fn new(handle: Option<RepositoryHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Stage for RepositoryAnalysisStage {
    fn id(&self) -> StageId {
        StageId::RepositoryAnalysis
    }

    async fn process(&self, ctx: &RunContext) -> Result<StageOutput, StageError> {
        let _guard = match &self.handle {
            Some(handle) => Some(handle.lock().await),
            None => None,
        };

        let root = ctx.repo_root().to_path_buf();
        let stats = tokio::task::spawn_blocking(move || analyze_repository(&root))
            .await
            .map_err(|e| {
                StageError::from_error(
                    self.id(),
                    &RepoflowError::io("joining analysis task", std::io::Error::other(e.to_string())),
                )
            })?
            .map_err(|e| StageError::from_error(self.id(), &e))?;

        tracing::debug!(
            files = stats.total_files,
            directories = stats.total_directories,
            "Repository analysis complete"
        );
        Ok(StageOutput::Analysis(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn sample_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(root.join("Makefile"), "all:").unwrap();
        fs::write(root.join(".gitignore"), "target").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("src/nested/util.py"), "x = 1").unwrap();
        dir
    }

    #[test]
    fn test_file_type_key() {
        assert_eq!(file_type_key(Path::new("a/b.rs")), ".rs");
        assert_eq!(file_type_key(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(file_type_key(Path::new("Makefile")), "");
        assert_eq!(file_type_key(Path::new(".gitignore")), "");
        assert_eq!(file_type_key(Path::new("trailing.")), "");
    }

    #[test]
    fn test_analyze_counts_match_independent_walk() {
        let repo = sample_repo();
        let stats = analyze_repository(repo.path()).unwrap();

        let mut files = 0;
        let mut dirs = 0;
        let mut stack = vec![repo.path().to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(dir).unwrap() {
                let entry = entry.unwrap();
                let ty = entry.file_type().unwrap();
                if ty.is_dir() {
                    dirs += 1;
                    stack.push(entry.path());
                } else if ty.is_file() {
                    files += 1;
                }
            }
        }

        assert_eq!(stats.total_files, files);
        assert_eq!(stats.total_directories, dirs);
        assert_eq!(stats.total_files, 6);
        assert_eq!(stats.total_directories, 3);
    }

    #[test]
    fn test_analyze_file_types() {
        let repo = sample_repo();
        let stats = analyze_repository(repo.path()).unwrap();

        let expected: BTreeMap<String, usize> = [
            (String::new(), 2),
            (".md".to_string(), 1),
            (".py".to_string(), 1),
            (".rs".to_string(), 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(stats.file_types, expected);
        assert_eq!(stats.file_types.values().sum::<usize>(), stats.total_files);
    }

    #[test]
    fn test_analyze_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = analyze_repository(&dir.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stage_records_analysis() {
        let repo = sample_repo();
        let stage = RepositoryAnalysisStage::new(Some(RepositoryHandle::unshared(repo.path())));
        let ctx = RunContext::new(repo.path(), None);

        let output = stage.process(&ctx).await.unwrap();
        match output {
            StageOutput::Analysis(stats) => assert_eq!(stats.total_files, 6),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stage_failure_is_a_result() {
        let dir = tempfile::tempdir().unwrap();
        let stage = RepositoryAnalysisStage::default();
        let ctx = RunContext::new(dir.path().join("missing"), None);

        let err = stage.process(&ctx).await.unwrap_err();
        assert_eq!(err.stage, StageId::RepositoryAnalysis);
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
