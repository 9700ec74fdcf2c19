use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::backend::common::constants::{
    DISCOVERY_SKIPPED_DIRECTORIES, GROOVE_DIR_NAME, MAX_DISCOVERY_DEPTH,
    MAX_DISCOVERY_DIRECTORIES, MAX_SEARCH_BASE_ANCESTORS, WORKSPACE_META_FILE_NAME,
    WORKTREES_DIR_NAME,
};
use crate::backend::common::dtos::{CandidateRoot, WorkspaceMetaContext, WorkspaceRootPayload};
use crate::backend::common::error::ResolveError;
use crate::workspace::{
    path_is_directory, path_is_file, validate_known_worktrees, validate_required_worktree,
    validate_root_name, validate_workspace_root_path, validate_workspace_root_shape,
};

use super::discovery_scope::{expected_workspace_meta, select_workspace_root, workspace_meta_matches};

/// Where and how far discovery is allowed to walk.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub search_bases: Vec<PathBuf>,
    pub max_depth: usize,
    pub max_directories: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::with_bases(build_likely_search_bases())
    }
}

impl DiscoveryOptions {
    pub fn with_bases(search_bases: Vec<PathBuf>) -> Self {
        Self {
            search_bases,
            max_depth: MAX_DISCOVERY_DEPTH,
            max_directories: MAX_DISCOVERY_DIRECTORIES,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DiscoveryReport {
    pub(crate) candidates: Vec<CandidateRoot>,
    pub(crate) visited_directories: usize,
    pub(crate) truncated: bool,
}

/// A resolved root together with the validated worktree names it was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkspace {
    pub workspace_root: PathBuf,
    pub known_worktrees: Vec<String>,
}

pub(crate) fn build_likely_search_bases() -> Vec<PathBuf> {
    let mut bases = Vec::new();
    let mut seen = HashSet::new();

    if let Ok(mut cursor) = std::env::current_dir() {
        for _ in 0..=MAX_SEARCH_BASE_ANCESTORS {
            if seen.insert(cursor.clone()) {
                bases.push(cursor.clone());
            }

            let Some(parent) = cursor.parent() else {
                break;
            };

            if parent == cursor {
                break;
            }

            cursor = parent.to_path_buf();
        }
    }

    if let Some(home) = dirs::home_dir() {
        if seen.insert(home.clone()) {
            bases.push(home);
        }
    }

    bases
}

pub(crate) fn workspace_meta_path(workspace_root: &Path) -> PathBuf {
    workspace_root
        .join(GROOVE_DIR_NAME)
        .join(WORKSPACE_META_FILE_NAME)
}

pub(crate) fn read_workspace_meta(workspace_root: &Path) -> Option<WorkspaceMetaContext> {
    let workspace_json = workspace_meta_path(workspace_root);
    if !path_is_file(&workspace_json) {
        return None;
    }

    let raw = fs::read_to_string(&workspace_json).ok()?;
    let parsed = serde_json::from_str::<serde_json::Value>(&raw).ok()?;
    let obj = parsed.as_object()?;

    let text_field = |key: &str| {
        obj.get(key)
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
    };

    let meta = WorkspaceMetaContext {
        version: obj.get("version").and_then(|value| value.as_i64()),
        root_name: text_field("rootName"),
        created_at: text_field("createdAt"),
        updated_at: text_field("updatedAt"),
    };

    if meta.is_empty() {
        return None;
    }

    Some(meta)
}

pub(crate) fn inspect_candidate_root(
    root_path: &Path,
    required_worktree: Option<&str>,
    known_worktrees: &[String],
    expected_workspace_meta: Option<&WorkspaceMetaContext>,
) -> Option<CandidateRoot> {
    let worktrees_dir = root_path.join(WORKTREES_DIR_NAME);
    if !path_is_directory(&worktrees_dir) {
        return None;
    }

    if let Some(worktree) = required_worktree {
        if !path_is_directory(&worktrees_dir.join(worktree)) {
            return None;
        }
    }

    for known in known_worktrees {
        if !path_is_directory(&worktrees_dir.join(known)) {
            return None;
        }
    }

    let observed = read_workspace_meta(root_path);

    Some(CandidateRoot {
        root_path: root_path.to_path_buf(),
        has_workspace_meta: observed.is_some(),
        matches_workspace_meta: workspace_meta_matches(observed.as_ref(), expected_workspace_meta),
    })
}

pub(crate) fn discover_workspace_root_candidates(
    root_name: &str,
    required_worktree: Option<&str>,
    known_worktrees: &[String],
    expected_workspace_meta: Option<&WorkspaceMetaContext>,
    options: &DiscoveryOptions,
) -> DiscoveryReport {
    let skipped = HashSet::from(DISCOVERY_SKIPPED_DIRECTORIES);

    let mut candidates = HashMap::<PathBuf, CandidateRoot>::new();
    let mut scanned = 0usize;
    let mut truncated = false;

    'bases: for base in &options.search_bases {
        if scanned >= options.max_directories {
            truncated = true;
            break;
        }

        let walker = WalkDir::new(base)
            .follow_links(false)
            .max_depth(options.max_depth)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }

                if !entry.file_type().is_dir() {
                    return false;
                }

                let name = entry.file_name().to_string_lossy();
                !skipped.contains(name.as_ref())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::debug!("[workspace-discovery] skipping unreadable entry: {error}");
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if scanned >= options.max_directories {
                truncated = true;
                break 'bases;
            }

            scanned += 1;

            if entry.file_name().to_string_lossy() != root_name {
                continue;
            }

            if let Some(candidate) = inspect_candidate_root(
                entry.path(),
                required_worktree,
                known_worktrees,
                expected_workspace_meta,
            ) {
                candidates.insert(candidate.root_path.clone(), candidate);
            }
        }
    }

    let mut collected = candidates.into_values().collect::<Vec<_>>();
    collected.sort_by(|a, b| a.root_path.cmp(&b.root_path));

    DiscoveryReport {
        candidates: collected,
        visited_directories: scanned,
        truncated,
    }
}

fn describe_search(
    options: &DiscoveryOptions,
    report: &DiscoveryReport,
    known_worktrees: &[String],
) -> String {
    let known = if known_worktrees.is_empty() {
        "none".to_string()
    } else {
        known_worktrees.join(", ")
    };
    let truncated = if report.truncated {
        ", stopped at the directory limit"
    } else {
        ""
    };

    format!(
        "searched {} base directories up to depth {}, visited {} directories{}, knownWorktrees: {}",
        options.search_bases.len(),
        options.max_depth,
        report.visited_directories,
        truncated,
        known
    )
}

/// Validates every caller-supplied field, then either checks the explicit
/// `workspaceRoot` or walks the search bases looking for `rootName`.
pub fn resolve_workspace_root(
    payload: &WorkspaceRootPayload,
    options: &DiscoveryOptions,
) -> Result<ResolvedWorkspace, ResolveError> {
    let known_worktrees =
        validate_known_worktrees(&payload.known_worktrees).map_err(ResolveError::InvalidInput)?;
    let required_worktree = validate_required_worktree(payload.worktree.as_deref())
        .map_err(ResolveError::InvalidInput)?;
    let root_name =
        validate_root_name(payload.root_name.as_deref()).map_err(ResolveError::InvalidInput)?;
    let override_root = payload
        .workspace_root
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(override_root) = override_root {
        validate_workspace_root_shape(override_root).map_err(ResolveError::InvalidInput)?;
        let workspace_root =
            validate_workspace_root_path(override_root).map_err(ResolveError::NotFound)?;
        tracing::debug!(
            "[workspace-discovery] using explicit workspaceRoot {}",
            workspace_root.display()
        );
        return Ok(ResolvedWorkspace {
            workspace_root,
            known_worktrees,
        });
    }

    let Some(root_name) = root_name else {
        return Err(ResolveError::InvalidInput(
            "Could not auto-resolve workspace root: provide workspaceRoot or rootName.".to_string(),
        ));
    };

    let expected = expected_workspace_meta(payload.workspace_meta.as_ref());
    let report = discover_workspace_root_candidates(
        &root_name,
        required_worktree.as_deref(),
        &known_worktrees,
        expected.as_ref(),
        options,
    );
    tracing::debug!(
        "[workspace-discovery] rootName={root_name} candidates={} visited={} truncated={}",
        report.candidates.len(),
        report.visited_directories,
        report.truncated
    );

    let summary = describe_search(options, &report, &known_worktrees);
    let workspace_root = select_workspace_root(&root_name, &report.candidates, &summary)?;

    Ok(ResolvedWorkspace {
        workspace_root,
        known_worktrees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_root(base: &Path, relative: &str, worktrees: &[&str]) -> PathBuf {
        let root = base.join(relative);
        fs::create_dir_all(root.join(WORKTREES_DIR_NAME)).unwrap();
        for worktree in worktrees {
            fs::create_dir_all(root.join(WORKTREES_DIR_NAME).join(worktree)).unwrap();
        }
        root
    }

    fn write_meta(root: &Path, body: &str) {
        fs::create_dir_all(root.join(GROOVE_DIR_NAME)).unwrap();
        fs::write(workspace_meta_path(root), body).unwrap();
    }

    fn payload(root_name: &str, known: &[&str]) -> WorkspaceRootPayload {
        WorkspaceRootPayload {
            root_name: Some(root_name.to_string()),
            known_worktrees: known.iter().map(|value| value.to_string()).collect(),
            ..Default::default()
        }
    }

    fn options_for(base: &TempDir) -> DiscoveryOptions {
        DiscoveryOptions::with_bases(vec![base.path().to_path_buf()])
    }

    #[test]
    fn resolves_single_structural_match() {
        let base = tempfile::tempdir().unwrap();
        let root = make_root(base.path(), "code/proj", &["feature_a"]);
        fs::create_dir_all(base.path().join("other/proj")).unwrap();

        let resolved =
            resolve_workspace_root(&payload("proj", &["feature_a"]), &options_for(&base)).unwrap();
        assert_eq!(resolved.workspace_root, root);
        assert_eq!(resolved.known_worktrees, vec!["feature_a".to_string()]);
    }

    #[test]
    fn known_worktrees_filter_out_siblings() {
        let base = tempfile::tempdir().unwrap();
        make_root(base.path(), "a/proj", &["main"]);
        let expected = make_root(base.path(), "b/proj", &["main", "feature/login-fix"]);

        let resolved = resolve_workspace_root(
            &payload("proj", &["feature/login-fix"]),
            &options_for(&base),
        )
        .unwrap();
        assert_eq!(resolved.workspace_root, expected);
    }

    #[test]
    fn required_worktree_joins_structural_test() {
        let base = tempfile::tempdir().unwrap();
        make_root(base.path(), "a/proj", &[]);
        let expected = make_root(base.path(), "b/proj", &["bugfix"]);

        let mut request = payload("proj", &[]);
        request.worktree = Some("bugfix".to_string());
        let resolved = resolve_workspace_root(&request, &options_for(&base)).unwrap();
        assert_eq!(resolved.workspace_root, expected);
    }

    #[test]
    fn zero_matches_names_root_name() {
        let base = tempfile::tempdir().unwrap();
        fs::create_dir_all(base.path().join("proj")).unwrap();

        let error = resolve_workspace_root(&payload("proj", &[]), &options_for(&base)).unwrap_err();
        assert!(matches!(error, ResolveError::NotFound(_)));
        assert!(error.to_string().contains("\"proj\""));
    }

    #[test]
    fn two_unfingerprinted_matches_are_ambiguous() {
        let base = tempfile::tempdir().unwrap();
        let first = make_root(base.path(), "one/proj", &[]);
        let second = make_root(base.path(), "two/proj", &[]);

        let error = resolve_workspace_root(&payload("proj", &[]), &options_for(&base)).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("found 2 matches"), "{message}");
        assert!(message.contains(&first.display().to_string()));
        assert!(message.contains(&second.display().to_string()));
    }

    #[test]
    fn fingerprint_picks_unique_match() {
        let base = tempfile::tempdir().unwrap();
        let first = make_root(base.path(), "one/proj", &[]);
        let second = make_root(base.path(), "two/proj", &[]);
        write_meta(
            &first,
            r#"{"version":1,"rootName":"proj","createdAt":"2024-01-01T00:00:00Z"}"#,
        );
        write_meta(
            &second,
            r#"{"version":1,"rootName":"proj","createdAt":"2025-06-01T00:00:00Z"}"#,
        );

        let mut request = payload("proj", &[]);
        request.workspace_meta = Some(WorkspaceMetaContext {
            created_at: Some("2025-06-01T00:00:00Z".to_string()),
            ..Default::default()
        });
        let resolved = resolve_workspace_root(&request, &options_for(&base)).unwrap();
        assert_eq!(resolved.workspace_root, second);
    }

    #[test]
    fn depth_limit_hides_deep_sentinel() {
        let base = tempfile::tempdir().unwrap();
        make_root(base.path(), "a/b/c/d/proj", &[]);

        let error = resolve_workspace_root(&payload("proj", &[]), &options_for(&base)).unwrap_err();
        assert!(matches!(error, ResolveError::NotFound(_)));

        let shallow = make_root(base.path(), "a/b/c/proj", &[]);
        let resolved = resolve_workspace_root(&payload("proj", &[]), &options_for(&base)).unwrap();
        assert_eq!(resolved.workspace_root, shallow);
    }

    #[test]
    fn directory_cap_stops_the_walk() {
        let base = tempfile::tempdir().unwrap();
        for index in 0..20 {
            fs::create_dir_all(base.path().join(format!("dir-{index:02}"))).unwrap();
        }
        let mut options = options_for(&base);
        options.max_directories = 5;

        let report = discover_workspace_root_candidates("proj", None, &[], None, &options);
        assert_eq!(report.visited_directories, 5);
        assert!(report.truncated);
    }

    #[test]
    fn skips_noise_directories() {
        let base = tempfile::tempdir().unwrap();
        make_root(base.path(), "node_modules/proj", &[]);
        make_root(base.path(), ".git/proj", &[]);

        let report = discover_workspace_root_candidates(
            "proj",
            None,
            &[],
            None,
            &options_for(&base),
        );
        assert!(report.candidates.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn never_follows_symlinked_directories() {
        let base = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        make_root(outside.path(), "proj", &[]);
        std::os::unix::fs::symlink(outside.path(), base.path().join("link")).unwrap();

        let report = discover_workspace_root_candidates(
            "proj",
            None,
            &[],
            None,
            &options_for(&base),
        );
        assert!(report.candidates.is_empty());
    }

    #[test]
    fn duplicate_bases_do_not_duplicate_candidates() {
        let base = tempfile::tempdir().unwrap();
        let root = make_root(base.path(), "x/proj", &[]);
        let options = DiscoveryOptions::with_bases(vec![
            base.path().to_path_buf(),
            base.path().join("x"),
        ]);

        let resolved = resolve_workspace_root(&payload("proj", &[]), &options).unwrap();
        assert_eq!(resolved.workspace_root, root);
    }

    #[test]
    fn explicit_root_skips_discovery() {
        let base = tempfile::tempdir().unwrap();
        let request = WorkspaceRootPayload {
            workspace_root: Some(base.path().display().to_string()),
            ..Default::default()
        };
        let resolved =
            resolve_workspace_root(&request, &DiscoveryOptions::with_bases(Vec::new())).unwrap();
        assert_eq!(resolved.workspace_root, base.path());
    }

    #[test]
    fn invalid_inputs_fail_before_walking() {
        let options = DiscoveryOptions::with_bases(Vec::new());

        let relative = WorkspaceRootPayload {
            workspace_root: Some("relative/proj".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_workspace_root(&relative, &options),
            Err(ResolveError::InvalidInput(_))
        ));

        assert!(matches!(
            resolve_workspace_root(&payload("a/b", &[]), &options),
            Err(ResolveError::InvalidInput(_))
        ));

        assert!(matches!(
            resolve_workspace_root(&payload("proj", &["../escape"]), &options),
            Err(ResolveError::InvalidInput(_))
        ));

        assert!(matches!(
            resolve_workspace_root(&WorkspaceRootPayload::default(), &options),
            Err(ResolveError::InvalidInput(_))
        ));
    }

    #[test]
    fn reads_partial_or_malformed_meta_leniently() {
        let base = tempfile::tempdir().unwrap();
        let root = make_root(base.path(), "proj", &[]);

        write_meta(&root, r#"{"version":"one","rootName":"proj"}"#);
        let meta = read_workspace_meta(&root).unwrap();
        assert_eq!(meta.version, None);
        assert_eq!(meta.root_name.as_deref(), Some("proj"));

        write_meta(&root, "not json");
        assert_eq!(read_workspace_meta(&root), None);

        write_meta(&root, "{}");
        assert_eq!(read_workspace_meta(&root), None);
    }
}
