use thiserror::Error;

/// Errors produced by the manifest graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("data lake is not initialized: {0}")]
    Uninitialized(String),

    #[error("manifest is not mounted: {0}")]
    NotMounted(String),

    #[error("cannot determine a content type for {0}")]
    UnknownContentType(String),

    #[error("invalid imports declaration in {uri}: {reason}")]
    BadImports { uri: String, reason: String },

    #[error("invalid reload pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },

    #[error(transparent)]
    Protocol(#[from] doclake_protocol::ProtocolError),

    #[error(transparent)]
    Content(#[from] doclake_content::ContentError),

    #[error(transparent)]
    Resolver(#[from] doclake_resolver::ResolverError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
