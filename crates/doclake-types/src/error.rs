use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed data lake path {input:?}: {reason}")]
    PathFormat { input: String, reason: String },

    #[error("malformed object URL {input:?}: {reason}")]
    UrlFormat { input: String, reason: String },
}
