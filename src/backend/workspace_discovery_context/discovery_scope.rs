use std::path::PathBuf;

use crate::backend::common::constants::MAX_AMBIGUITY_PREVIEW;
use crate::backend::common::dtos::{CandidateRoot, WorkspaceMetaContext};
use crate::backend::common::error::ResolveError;

/// An expectation only discriminates when it names a rootName, createdAt or version.
pub(crate) fn expected_workspace_meta(
    value: Option<&WorkspaceMetaContext>,
) -> Option<WorkspaceMetaContext> {
    value
        .filter(|meta| {
            meta.root_name.is_some() || meta.created_at.is_some() || meta.version.is_some()
        })
        .cloned()
}

pub(crate) fn workspace_meta_matches(
    observed: Option<&WorkspaceMetaContext>,
    expected: Option<&WorkspaceMetaContext>,
) -> bool {
    let (Some(observed), Some(expected)) = (observed, expected) else {
        return false;
    };

    if let Some(expected_root) = &expected.root_name {
        if observed.root_name.as_ref() != Some(expected_root) {
            return false;
        }
    }

    if let Some(expected_created) = &expected.created_at {
        if observed.created_at.as_ref() != Some(expected_created) {
            return false;
        }
    }

    if let Some(expected_version) = expected.version {
        if observed.version != Some(expected_version) {
            return false;
        }
    }

    true
}

fn ambiguity_preview(candidates: &[CandidateRoot]) -> String {
    let metadata_matches = candidates
        .iter()
        .filter(|candidate| candidate.matches_workspace_meta)
        .collect::<Vec<_>>();
    let candidates_with_meta = candidates
        .iter()
        .filter(|candidate| candidate.has_workspace_meta)
        .collect::<Vec<_>>();

    let diagnostics = if metadata_matches.len() > 1 {
        metadata_matches
    } else if !candidates_with_meta.is_empty() {
        candidates_with_meta
    } else {
        candidates.iter().collect::<Vec<_>>()
    };

    diagnostics
        .iter()
        .take(MAX_AMBIGUITY_PREVIEW)
        .map(|candidate| candidate.root_path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Picks the single winning root, in order: sole candidate, no candidate,
/// sole metadata match, ambiguous.
pub(crate) fn select_workspace_root(
    root_name: &str,
    candidates: &[CandidateRoot],
    search_summary: &str,
) -> Result<PathBuf, ResolveError> {
    if let [only] = candidates {
        return Ok(only.root_path.clone());
    }

    if candidates.is_empty() {
        return Err(ResolveError::NotFound(format!(
            "Could not auto-resolve workspace root for rootName \"{root_name}\" ({search_summary}). \
             Re-open the workspace to rescan, or pass workspaceRoot explicitly."
        )));
    }

    let mut metadata_matches = candidates
        .iter()
        .filter(|candidate| candidate.matches_workspace_meta);
    if let (Some(winner), None) = (metadata_matches.next(), metadata_matches.next()) {
        return Ok(winner.root_path.clone());
    }

    Err(ResolveError::Ambiguous {
        count: candidates.len(),
        preview: ambiguity_preview(candidates),
    })
}
