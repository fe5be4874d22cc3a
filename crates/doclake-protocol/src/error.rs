use thiserror::Error;

/// Errors produced by protocol dispatch.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("no protocol driver registered for scheme {0:?}")]
    NotFound(String),

    #[error("cannot extract a scheme from URI {0:?}")]
    BadUri(String),

    #[error("method {method} is not available for {uri}")]
    MethodUnavailable { method: String, uri: String },

    #[error("transport failure for {uri}: {reason}")]
    Transport { uri: String, reason: String },

    #[error("resource not found: {0}")]
    ResourceMissing(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
