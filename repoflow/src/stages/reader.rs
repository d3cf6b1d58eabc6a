//! Code-Reader stage: best-effort aggregation of source text.

use super::{Stage, StageId};
use crate::changes::BACKUP_DIR_NAME;
use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::{RepoflowError, StageError};
use crate::repository::RepositoryHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Extensions whose files are read.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "java", "go", "c", "h", "cpp", "hpp", "cs", "rb", "php",
    "swift", "kt", "scala", "sh", "sql", "html", "css", "scss", "json", "yaml", "yml", "toml", "md",
    "txt", "xml", "ini", "cfg",
];

/// Directory names that are never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    ".env",
    "target",
    "dist",
    "build",
    ".idea",
    ".vscode",
    BACKUP_DIR_NAME,
];

/// A file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadError {
    /// Repository-relative path.
    pub path: String,
    /// Why reading failed.
    pub message: String,
}

/// Concatenated source text of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlob {
    /// Every file's content, each preceded by a path header.
    pub text: String,
    /// Relative paths that were read successfully.
    pub files_read: Vec<String>,
    /// Files that failed; their errors also appear inline in `text`.
    pub read_errors: Vec<FileReadError>,
}

impl CodeBlob {
    /// Returns true if no file contributed any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_read.is_empty() && self.read_errors.is_empty()
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && IGNORED_DIRS.iter().any(|name| entry.file_name() == *name)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Reads every allow-listed file below `root`, skipping ignored directories.
///
/// Unreadable files are recorded inline and in `read_errors`; they never abort
/// the aggregation.
///
/// # Errors
///
/// Returns an error only if the root itself cannot be traversed.
pub fn read_code(root: &Path) -> Result<CodeBlob, RepoflowError> {
    let mut blob = CodeBlob::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let context = format!("reading code under {}", root.display());
                return Err(match e.into_io_error() {
                    Some(io) => RepoflowError::io(context, io),
                    None => RepoflowError::io(context, std::io::Error::other("filesystem loop detected")),
                });
            }
            Err(e) => {
                let path = e.path().map(|p| relative(root, p)).unwrap_or_default();
                tracing::warn!(path = %path, error = %e, "Skipping unreadable entry");
                let _ = write!(blob.text, "\n--- File: {path} ---\n[Error reading file: {e}]\n");
                blob.read_errors.push(FileReadError {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_source_extension(entry.path()) {
            continue;
        }

        let rel = relative(root, entry.path());
        match std::fs::read_to_string(entry.path()) {
            Ok(content) => {
                let _ = write!(blob.text, "\n--- File: {rel} ---\n{content}\n");
                blob.files_read.push(rel);
            }
            Err(e) => {
                tracing::warn!(path = %rel, error = %e, "Error reading file");
                let _ = write!(blob.text, "\n--- File: {rel} ---\n[Error reading file: {e}]\n");
                blob.read_errors.push(FileReadError {
                    path: rel,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(blob)
}

/// Stage producing a [`CodeBlob`] for the run's repository.
#[derive(Debug, Clone, Default)]
pub struct CodeReaderStage {
    handle: Option<RepositoryHandle>,
}

impl CodeReaderStage {
    /// Creates the stage. With a handle, reading holds the repository lock.
    #[must_use]
    pub fn new(handle: Option<RepositoryHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Stage for CodeReaderStage {
    fn id(&self) -> StageId {
        StageId::CodeReader
    }

    async fn process(&self, ctx: &RunContext) -> Result<StageOutput, StageError> {
        let _guard = match &self.handle {
            Some(handle) => Some(handle.lock().await),
            None => None,
        };

        let root = ctx.repo_root().to_path_buf();
        let blob = tokio::task::spawn_blocking(move || read_code(&root))
            .await
            .map_err(|e| {
                StageError::from_error(
                    self.id(),
                    &RepoflowError::io("joining code reader task", std::io::Error::other(e.to_string())),
                )
            })?
            .map_err(|e| StageError::from_error(self.id(), &e))?;

        tracing::debug!(
            files = blob.files_read.len(),
            errors = blob.read_errors.len(),
            bytes = blob.text.len(),
            "Code read complete"
        );
        Ok(StageOutput::Code(blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_reads_allowed_extensions_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "notes.txt", "hello");
        write(dir.path(), "image.png", "not text");

        let blob = read_code(dir.path()).unwrap();
        assert_eq!(blob.files_read, vec!["notes.txt".to_string(), "src/main.rs".to_string()]);
        assert!(blob.text.contains("--- File: src/main.rs ---\nfn main() {}"));
        assert!(blob.text.contains("--- File: notes.txt ---\nhello"));
        assert!(!blob.text.contains("image.png"));
        assert!(blob.read_errors.is_empty());
    }

    #[test]
    fn test_ignored_directories_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "print('hi')");
        write(dir.path(), "node_modules/lib/index.js", "module.exports = 1");
        write(dir.path(), "pkg/deep/node_modules/x.js", "x");
        write(dir.path(), "pkg/.git/config.txt", "git");
        write(dir.path(), "a/b/c/__pycache__/m.py", "cached");
        write(dir.path(), "svc/venv/lib/site.py", "venv");
        write(dir.path(), ".code_backup/app.py", "old");
        write(dir.path(), "pkg/deep/keep.js", "kept");

        let blob = read_code(dir.path()).unwrap();
        assert_eq!(blob.files_read, vec!["app.py".to_string(), "pkg/deep/keep.js".to_string()]);
        for ignored in ["node_modules", ".git", "__pycache__", "venv", ".code_backup"] {
            assert!(
                !blob.files_read.iter().any(|p| p.split('/').any(|seg| seg == ignored)),
                "{ignored} leaked into {:?}",
                blob.files_read
            );
        }
    }

    #[test]
    fn test_unreadable_file_is_recorded_inline() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.rs", "ok");
        fs::write(dir.path().join("bad.rs"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let blob = read_code(dir.path()).unwrap();
        assert_eq!(blob.files_read, vec!["good.rs".to_string()]);
        assert_eq!(blob.read_errors.len(), 1);
        assert_eq!(blob.read_errors[0].path, "bad.rs");
        assert!(blob.text.contains("--- File: bad.rs ---\n[Error reading file:"));
    }

    #[test]
    fn test_empty_repository() {
        let dir = tempfile::tempdir().unwrap();
        let blob = read_code(dir.path()).unwrap();
        assert!(blob.is_empty());
        assert!(blob.text.is_empty());
    }

    #[tokio::test]
    async fn test_stage_outputs_code() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib.rs", "pub fn f() {}");
        let stage = CodeReaderStage::new(Some(RepositoryHandle::unshared(dir.path())));
        let ctx = RunContext::new(dir.path(), Some("explain".into()));

        match stage.process(&ctx).await.unwrap() {
            StageOutput::Code(blob) => assert_eq!(blob.files_read, vec!["lib.rs".to_string()]),
            other => panic!("unexpected output {other:?}"),
        }
    }
}
