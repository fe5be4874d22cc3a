use thiserror::Error;

/// Errors produced by query parsing, evaluation, and profile resolution.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("parse error at offset {position}: {reason}")]
    Parse { position: usize, reason: String },

    #[error("evaluation error at offset {position}: {reason}")]
    Eval { position: usize, reason: String },

    #[error("unknown variable ${0}")]
    UnknownVariable(String),

    #[error("evaluation terminated by debugger or cancellation")]
    Terminated,

    #[error("unsupported data source: {0}")]
    BadSource(String),

    #[error("failed to load {uri}: {reason}")]
    SourceLoad { uri: String, reason: String },

    #[error(transparent)]
    Resolver(#[from] doclake_resolver::ResolverError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
