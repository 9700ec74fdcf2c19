mod backend;
mod workspace;

pub use backend::common::constants::{DEFAULT_SERVICE_HOST, DEFAULT_SERVICE_PORT};
pub use backend::common::dtos::{WorkspaceMetaContext, WorkspaceRootPayload, WorkspaceRootResponse};
pub use backend::common::error::{ResolveError, ServiceError};
pub use backend::event_polling_emission_pipeline::event_runtime::{
    open_workspace_event_stream, NotifierOptions, WorkspaceEventConnection, WorkspaceEventStream,
};
pub use backend::event_polling_emission_pipeline::event_scope::SseFrame;
pub use backend::frontend_command_registry::command_entry::{
    bind_listener, run, serve, ServiceConfig,
};
pub use backend::workspace_discovery_context::discovery_runtime::{
    resolve_workspace_root, DiscoveryOptions, ResolvedWorkspace,
};
