//! Temporary repositories for tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A repository in a temporary directory, removed on drop.
#[derive(Debug)]
pub struct RepoFixture {
    dir: TempDir,
}

impl RepoFixture {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Adds a file, creating parent directories.
    #[must_use]
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        self.write(rel, content);
        self
    }

    /// Writes a file, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Reads a file as text.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    /// Repository root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Canonical repository root.
    pub fn canonical(&self) -> PathBuf {
        self.dir.path().canonicalize().unwrap()
    }
}

impl Default for RepoFixture {
    fn default() -> Self {
        Self::new()
    }
}
