//! Resolution of change-set paths inside a repository root.

use super::BACKUP_DIR_NAME;
use crate::errors::PathEscapeError;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Lexically normalizes `requested` relative to the root.
///
/// Returns the normalized relative path, or an error if it is empty, absolute,
/// climbs above the root, or targets the backup area.
pub fn normalize_relative(requested: &str) -> Result<PathBuf, PathEscapeError> {
    if requested.trim().is_empty() {
        return Err(PathEscapeError::new(requested, "path is empty"));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(PathEscapeError::new(requested, "path escapes the repository root"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathEscapeError::new(requested, "absolute paths are not allowed"));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(PathEscapeError::new(requested, "path resolves to the repository root"));
    }

    if normalized
        .components()
        .next()
        .is_some_and(|c| c.as_os_str() == BACKUP_DIR_NAME)
    {
        return Err(PathEscapeError::new(requested, "the backup area cannot be modified"));
    }

    Ok(normalized)
}

/// Checks that no existing component of `relative` below `root` is a symlink
/// leading outside `root`.
///
/// Dangling symlinks are rejected outright: writing through one would create
/// its target wherever it points. `root` must already be canonical.
pub(crate) fn ensure_contained(root: &Path, relative: &Path, requested: &str) -> Result<(), PathEscapeError> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        let Ok(metadata) = fs::symlink_metadata(&current) else {
            break;
        };
        if !metadata.file_type().is_symlink() {
            continue;
        }
        match current.canonicalize() {
            Ok(resolved) if resolved.starts_with(root) => {}
            Ok(_) => {
                return Err(PathEscapeError::new(
                    requested,
                    "path resolves outside the repository root through a symlink",
                ));
            }
            Err(_) => {
                return Err(PathEscapeError::new(
                    requested,
                    "path goes through a dangling symlink",
                ));
            }
        }
    }
    Ok(())
}

/// Resolves `requested` to an absolute path that stays within `root`.
///
/// Besides the lexical checks of [`normalize_relative`], every existing
/// component of the target is checked with [`ensure_contained`] so that
/// symlinks pointing outside the root, or nowhere, are rejected too. `root`
/// must already be canonical.
pub fn resolve_within(root: &Path, requested: &str) -> Result<(PathBuf, PathBuf), PathEscapeError> {
    let relative = normalize_relative(requested)?;
    ensure_contained(root, &relative, requested)?;
    let target = root.join(&relative);
    Ok((relative, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_nested_paths() {
        assert_eq!(normalize_relative("src/main.rs").unwrap(), PathBuf::from("src/main.rs"));
        assert_eq!(normalize_relative("./src/../lib.rs").unwrap(), PathBuf::from("lib.rs"));
        assert_eq!(normalize_relative("a/./b/c.txt").unwrap(), PathBuf::from("a/b/c.txt"));
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        for bad in ["../outside.txt", "src/../../x", "..", "a/../../b"] {
            let err = normalize_relative(bad).unwrap_err();
            assert_eq!(err.path, bad);
            assert!(err.reason.contains("escapes"), "{bad}: {}", err.reason);
        }
    }

    #[test]
    fn test_normalize_rejects_absolute_and_empty() {
        assert!(normalize_relative("/etc/passwd").unwrap_err().reason.contains("absolute"));
        assert!(normalize_relative("").is_err());
        assert!(normalize_relative("   ").is_err());
        assert!(normalize_relative("./").is_err());
    }

    #[test]
    fn test_normalize_rejects_backup_area() {
        let err = normalize_relative(".code_backup/a.txt").unwrap_err();
        assert!(err.reason.contains("backup"));
        assert!(normalize_relative("docs/.code_backup.md").is_ok());
    }

    #[test]
    fn test_resolve_within_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (rel, abs) = resolve_within(&root, "new/dir/file.rs").unwrap();
        assert_eq!(rel, PathBuf::from("new/dir/file.rs"));
        assert_eq!(abs, root.join("new/dir/file.rs"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_within_rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let err = resolve_within(&root, "link/evil.txt").unwrap_err();
        assert!(err.reason.contains("symlink"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_within_rejects_dangling_symlink() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(outside.path().join("pwned.txt"), root.join("link.txt")).unwrap();

        let err = resolve_within(&root, "link.txt").unwrap_err();
        assert!(err.reason.contains("dangling"), "{}", err.reason);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_within_allows_symlink_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let (rel, _) = resolve_within(&root, "alias/file.rs").unwrap();
        assert_eq!(rel, PathBuf::from("alias/file.rs"));
    }
}
