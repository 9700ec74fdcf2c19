use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::backend::common::constants::{GROOVE_DIR_NAME, WORKTREES_DIR_NAME};
use crate::backend::common::dtos::SnapshotEntry;
use crate::backend::workspace_discovery_context::discovery_runtime::workspace_meta_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WatchTarget {
    pub(crate) path: PathBuf,
    pub(crate) label: String,
}

pub(crate) fn build_watch_targets(
    workspace_root: &Path,
    known_worktrees: &[String],
) -> Vec<WatchTarget> {
    let worktrees_dir = workspace_root.join(WORKTREES_DIR_NAME);
    let mut paths = vec![
        worktrees_dir.clone(),
        workspace_root.join(GROOVE_DIR_NAME),
        workspace_meta_path(workspace_root),
    ];

    for worktree in known_worktrees {
        let worktree_root = worktrees_dir.join(worktree);
        paths.push(worktree_root.join(GROOVE_DIR_NAME));
        paths.push(workspace_meta_path(&worktree_root));
    }

    paths
        .into_iter()
        .map(|path| {
            let label = path
                .strip_prefix(workspace_root)
                .map(|value| value.display().to_string())
                .unwrap_or_else(|_| path.display().to_string());
            WatchTarget { path, label }
        })
        .collect()
}

pub(crate) fn snapshot_entry(path: &Path) -> SnapshotEntry {
    if let Ok(metadata) = fs::metadata(path) {
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or_default();

        SnapshotEntry {
            exists: true,
            mtime_ms,
        }
    } else {
        SnapshotEntry::MISSING
    }
}

/// Last observed state of every poll target, owned by one connection.
#[derive(Debug, Default)]
pub(crate) struct PollSnapshots {
    entries: HashMap<PathBuf, SnapshotEntry>,
}

impl PollSnapshots {
    pub(crate) fn capture(targets: &[WatchTarget]) -> Self {
        let entries = targets
            .iter()
            .map(|target| (target.path.clone(), snapshot_entry(&target.path)))
            .collect();
        Self { entries }
    }

    /// Re-snapshots every target and returns the labels whose existence or
    /// mtime moved since the previous call.
    pub(crate) fn refresh<'a>(&mut self, targets: &'a [WatchTarget]) -> Vec<&'a str> {
        let mut changed = Vec::new();
        for target in targets {
            let next = snapshot_entry(&target.path);
            let previous = self
                .entries
                .get(&target.path)
                .copied()
                .unwrap_or(SnapshotEntry::MISSING);

            if previous != next {
                self.entries.insert(target.path.clone(), next);
                changed.push(target.label.as_str());
            }
        }
        changed
    }
}

/// Maps a native notification path back to the watched target it belongs to.
pub(crate) fn source_label_for_path(targets: &[WatchTarget], path: &Path) -> Option<String> {
    path.ancestors().find_map(|ancestor| {
        targets
            .iter()
            .find(|target| target.path == ancestor)
            .map(|target| target.label.clone())
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Event { name: &'static str, data: String },
    Comment(&'static str),
}

impl SseFrame {
    pub fn render(&self) -> String {
        match self {
            SseFrame::Event { name, data } => format!("event: {name}\ndata: {data}\n\n"),
            SseFrame::Comment(text) => format!(": {text}\n\n"),
        }
    }

    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            SseFrame::Event { name, .. } => Some(*name),
            SseFrame::Comment(_) => None,
        }
    }

    pub fn data_json(&self) -> Option<serde_json::Value> {
        match self {
            SseFrame::Event { data, .. } => serde_json::from_str(data).ok(),
            SseFrame::Comment(_) => None,
        }
    }
}
