use thiserror::Error;

/// Terminal outcomes of a root resolution. `Display` is the user-facing sentence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error(
        "Could not auto-resolve workspace root: found {count} matches ({preview}). \
         Pass workspaceRoot explicitly or add workspace metadata to narrow the match."
    )]
    Ambiguous { count: usize, preview: String },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request exceeds the {limit} byte limit.")]
    PayloadTooLarge { limit: usize },
}
