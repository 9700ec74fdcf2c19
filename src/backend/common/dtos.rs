use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Optional fingerprint stored in `.groove/workspace.json`, also used as the
/// caller's expectation when disambiguating same-named roots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMetaContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl WorkspaceMetaContext {
    pub(crate) fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.root_name.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRootPayload {
    pub workspace_root: Option<String>,
    pub root_name: Option<String>,
    #[serde(default)]
    pub known_worktrees: Vec<String>,
    pub workspace_meta: Option<WorkspaceMetaContext>,
    pub worktree: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRootResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WorkspaceRootResponse {
    pub fn resolved(workspace_root: &std::path::Path) -> Self {
        Self {
            ok: true,
            workspace_root: Some(workspace_root.display().to_string()),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            workspace_root: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CandidateRoot {
    pub(crate) root_path: PathBuf,
    pub(crate) has_workspace_meta: bool,
    pub(crate) matches_workspace_meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SnapshotEntry {
    pub(crate) exists: bool,
    pub(crate) mtime_ms: u128,
}

impl SnapshotEntry {
    pub(crate) const MISSING: SnapshotEntry = SnapshotEntry {
        exists: false,
        mtime_ms: 0,
    };
}
