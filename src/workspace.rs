use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::backend::common::constants::MAX_KNOWN_WORKTREES;

fn is_safe_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

pub(crate) fn is_safe_path_token(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }

    value.split('/').all(is_safe_path_segment)
}

pub(crate) fn is_valid_root_name(value: &str) -> bool {
    !value.trim().is_empty()
        && !value.contains('/')
        && !value.contains('\\')
        && value != "."
        && value != ".."
}

pub(crate) fn validate_root_name(value: Option<&str>) -> Result<Option<String>, String> {
    let Some(trimmed) = value.map(str::trim).filter(|entry| !entry.is_empty()) else {
        return Ok(None);
    };

    if !is_valid_root_name(trimmed) {
        return Err(format!(
            "rootName \"{trimmed}\" must be a single directory name without path separators. Pass only the final folder name of the workspace."
        ));
    }

    Ok(Some(trimmed.to_string()))
}

pub(crate) fn validate_known_worktrees(known_worktrees: &[String]) -> Result<Vec<String>, String> {
    if known_worktrees.len() > MAX_KNOWN_WORKTREES {
        return Err(format!(
            "knownWorktrees is too large (max {MAX_KNOWN_WORKTREES} entries). Send only the worktrees you need to watch."
        ));
    }

    let mut set = HashSet::new();
    for entry in known_worktrees {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err("knownWorktrees entries must be non-empty strings. Remove blank entries and retry.".to_string());
        }

        if !is_safe_path_token(trimmed) {
            return Err(format!(
                "knownWorktrees contains unsafe characters or path segments: \"{trimmed}\". Use names made of letters, digits, '.', '_', '-' and '/'."
            ));
        }

        set.insert(trimmed.to_string());
    }

    let mut values = set.into_iter().collect::<Vec<_>>();
    values.sort();
    Ok(values)
}

pub(crate) fn validate_required_worktree(value: Option<&str>) -> Result<Option<String>, String> {
    let Some(trimmed) = value.map(str::trim).filter(|entry| !entry.is_empty()) else {
        return Ok(None);
    };

    if !is_safe_path_token(trimmed) {
        return Err(format!(
            "worktree \"{trimmed}\" contains unsafe characters or path segments. Use a name made of letters, digits, '.', '_', '-' and '/'."
        ));
    }

    Ok(Some(trimmed.to_string()))
}

/// Shape check for an explicit root. Does not touch the filesystem.
pub(crate) fn validate_workspace_root_shape(workspace_root: &str) -> Result<PathBuf, String> {
    let trimmed = workspace_root.trim();
    if trimmed.contains('\\') {
        return Err(format!(
            "workspaceRoot \"{trimmed}\" must use forward slashes only. Pass a POSIX-style absolute path."
        ));
    }

    let root = PathBuf::from(trimmed);
    if !root.is_absolute() {
        return Err(format!(
            "workspaceRoot \"{trimmed}\" must be an absolute path. Pass the full path or omit workspaceRoot to auto-discover."
        ));
    }

    for component in root.components() {
        match component {
            Component::Normal(value) => {
                let part = value.to_string_lossy();
                if !is_safe_path_segment(&part) {
                    return Err(format!(
                        "workspaceRoot \"{trimmed}\" contains an unsafe path segment \"{part}\". Rename the directory or omit workspaceRoot to auto-discover."
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir | Component::CurDir => {
                return Err(format!(
                    "workspaceRoot \"{trimmed}\" contains relative path segments. Pass a normalized absolute path."
                ));
            }
        }
    }

    Ok(root)
}

pub(crate) fn validate_workspace_root_path(workspace_root: &str) -> Result<PathBuf, String> {
    let root = validate_workspace_root_shape(workspace_root)?;

    if !path_is_directory(&root) {
        return Err(format!(
            "workspaceRoot \"{}\" is not an existing, accessible directory. Pass an existing directory or omit workspaceRoot to auto-discover.",
            root.display()
        ));
    }

    if std::fs::read_dir(&root).is_err() {
        return Err(format!(
            "workspaceRoot \"{}\" exists but cannot be read. Grant read access to it or pass a different directory.",
            root.display()
        ));
    }

    Ok(root)
}

pub(crate) fn path_is_directory(path: &Path) -> bool {
    path.is_dir()
}

pub(crate) fn path_is_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_branch_token() {
        assert!(is_safe_path_token("feature/login-fix"));
        assert!(is_safe_path_token("release_1.2"));
    }

    #[test]
    fn rejects_traversal_and_empty_segments() {
        assert!(!is_safe_path_token("a/../b"));
        assert!(!is_safe_path_token(".."));
        assert!(!is_safe_path_token("."));
        assert!(!is_safe_path_token("a//b"));
        assert!(!is_safe_path_token("/a"));
        assert!(!is_safe_path_token("a/"));
        assert!(!is_safe_path_token(""));
    }

    #[test]
    fn rejects_characters_outside_grammar() {
        for value in ["a b", "a\\b", "feat:x", "a$b", "naïve", "x;rm"] {
            assert!(!is_safe_path_token(value), "{value} should be rejected");
        }
    }

    #[test]
    fn rejects_invalid_known_worktree_entries() {
        let values = vec!["good".to_string(), "../bad".to_string()];
        assert!(validate_known_worktrees(&values).is_err());
    }

    #[test]
    fn dedupes_and_sorts_known_worktrees() {
        let values = vec![
            " zeta ".to_string(),
            "alpha".to_string(),
            "zeta".to_string(),
        ];
        assert_eq!(
            validate_known_worktrees(&values),
            Ok(vec!["alpha".to_string(), "zeta".to_string()])
        );
    }

    #[test]
    fn rejects_oversized_known_worktree_set() {
        let values = (0..=MAX_KNOWN_WORKTREES)
            .map(|index| format!("wt-{index}"))
            .collect::<Vec<_>>();
        let error = validate_known_worktrees(&values).unwrap_err();
        assert!(error.contains("too large"));
    }

    #[test]
    fn root_name_must_be_bare_directory_name() {
        assert_eq!(validate_root_name(Some("  proj ")), Ok(Some("proj".to_string())));
        assert_eq!(validate_root_name(Some("   ")), Ok(None));
        assert!(validate_root_name(Some("a/b")).is_err());
        assert!(validate_root_name(Some("..")).is_err());
        assert!(validate_root_name(Some("a\\b")).is_err());
    }

    #[test]
    fn validation_failures_suggest_a_remedy() {
        let failures = [
            validate_root_name(Some("a/b")).unwrap_err(),
            validate_known_worktrees(&["../escape".to_string()]).unwrap_err(),
            validate_known_worktrees(&[" ".to_string()]).unwrap_err(),
            validate_required_worktree(Some("a b")).unwrap_err(),
            validate_workspace_root_shape("proj").unwrap_err(),
            validate_workspace_root_shape("/tmp/../etc").unwrap_err(),
            validate_workspace_root_shape("/tmp/has space").unwrap_err(),
        ];

        for message in failures {
            let sentences = message.matches(". ").count() + 1;
            assert!(sentences >= 2, "no remedy offered: {message}");
        }
    }

    #[test]
    fn rejects_relative_or_unsafe_override_shapes() {
        assert!(validate_workspace_root_shape("proj").is_err());
        assert!(validate_workspace_root_shape("/tmp/../etc").is_err());
        assert!(validate_workspace_root_shape("/tmp/has space").is_err());
        assert!(validate_workspace_root_shape("/tmp/proj").is_ok());
    }

    #[test]
    fn override_must_exist_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let error = validate_workspace_root_path(&missing.display().to_string()).unwrap_err();
        assert!(error.contains(&missing.display().to_string()));
        assert!(error.contains("omit workspaceRoot to auto-discover"));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_workspace_root_path(&file.display().to_string()).is_err());

        let accepted = validate_workspace_root_path(&dir.path().display().to_string()).unwrap();
        assert_eq!(accepted, dir.path());
    }
}
