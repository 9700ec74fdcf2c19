use std::time::Duration;

pub(crate) const MAX_DISCOVERY_DEPTH: usize = 4;
pub(crate) const MAX_DISCOVERY_DIRECTORIES: usize = 2500;
pub(crate) const MAX_SEARCH_BASE_ANCESTORS: usize = 3;
pub(crate) const MAX_KNOWN_WORKTREES: usize = 128;
pub(crate) const MAX_AMBIGUITY_PREVIEW: usize = 5;

pub(crate) const DISCOVERY_SKIPPED_DIRECTORIES: [&str; 8] = [
    ".git",
    ".next",
    ".pnpm-store",
    ".turbo",
    ".cache",
    "dist",
    "node_modules",
    "target",
];

pub(crate) const WORKTREES_DIR_NAME: &str = ".worktrees";
pub(crate) const GROOVE_DIR_NAME: &str = ".groove";
pub(crate) const WORKSPACE_META_FILE_NAME: &str = "workspace.json";

pub(crate) const WORKSPACE_EVENTS_POLL_INTERVAL: Duration = Duration::from_millis(1800);
pub(crate) const WORKSPACE_EVENTS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
pub(crate) const WORKSPACE_EVENTS_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const WORKSPACE_EVENTS_KIND: &str = "filesystem";
pub(crate) const WORKSPACE_READY_EVENT: &str = "ready";
pub(crate) const WORKSPACE_CHANGE_EVENT: &str = "workspace-change";

pub const DEFAULT_SERVICE_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVICE_PORT: u16 = 7421;
pub(crate) const MAX_REQUEST_HEAD_BYTES: usize = 16 * 1024;
pub(crate) const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;
