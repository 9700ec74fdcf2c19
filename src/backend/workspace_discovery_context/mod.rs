pub(crate) mod discovery_runtime;
pub(crate) mod discovery_scope;
