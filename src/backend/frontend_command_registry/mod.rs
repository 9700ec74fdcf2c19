pub(crate) mod command_entry;
pub(crate) mod events_commands;
pub(crate) mod http_request;
pub(crate) mod workspace_commands;
