use std::sync::Arc;

use crate::backend::common::dtos::{WorkspaceRootPayload, WorkspaceRootResponse};
use crate::backend::common::error::ResolveError;
use crate::backend::workspace_discovery_context::discovery_runtime::{
    resolve_workspace_root, DiscoveryOptions, ResolvedWorkspace,
};

/// Runs resolution on a blocking worker; the walk is never interrupted midway.
pub(crate) async fn resolve_workspace_root_blocking(
    payload: WorkspaceRootPayload,
    options: Arc<DiscoveryOptions>,
) -> Result<ResolvedWorkspace, ResolveError> {
    match tokio::task::spawn_blocking(move || resolve_workspace_root(&payload, &options)).await {
        Ok(result) => result,
        Err(error) => {
            tracing::error!("[workspace-discovery] resolution task failed: {error}");
            Err(ResolveError::NotFound(
                "Workspace discovery stopped unexpectedly. Retry, or pass workspaceRoot explicitly."
                    .to_string(),
            ))
        }
    }
}

pub(crate) async fn workspace_resolve(
    payload: WorkspaceRootPayload,
    options: Arc<DiscoveryOptions>,
) -> WorkspaceRootResponse {
    match resolve_workspace_root_blocking(payload, options).await {
        Ok(resolved) => WorkspaceRootResponse::resolved(&resolved.workspace_root),
        Err(error) => {
            tracing::info!("[workspace-discovery] {error}");
            WorkspaceRootResponse::failed(error.to_string())
        }
    }
}
