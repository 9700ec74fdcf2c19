pub(crate) mod event_runtime;
pub(crate) mod event_scope;
pub(crate) mod event_sink;
