//! Unified diffs between a file's prior and new content.

use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// Unified diff for one file, keyed by its repository-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Repository-relative path.
    pub path: String,
    /// Unified diff text with `---`/`+++` headers naming `path`.
    pub diff: String,
}

/// Computes a unified diff from `old` to `new`.
///
/// New files are diffed against empty content, so every line shows as added.
#[must_use]
pub fn unified_diff(path: &str, old: &str, new: &str) -> Patch {
    let diff = TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string();

    Patch {
        path: path.to_string(),
        diff,
    }
}

/// Renders patches as a human-readable summary, one section per file.
#[must_use]
pub fn diff_summary(patches: &[Patch]) -> String {
    let rule = "-".repeat(40);
    patches
        .iter()
        .map(|p| format!("\nFile: {}\n{rule}\n{}", p.path, p.diff))
        .collect::<Vec<_>>()
        .join("\n")
}
