use thiserror::Error;

/// Errors produced by URI resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("no URI parts to resolve")]
    Empty,

    #[error("invalid URI {uri:?}: {reason}")]
    Value { uri: String, reason: String },

    #[error("base {base:?} and target {target:?} must share a scheme and host")]
    HostMismatch { base: String, target: String },
}

pub type Result<T> = std::result::Result<T, ResolverError>;
