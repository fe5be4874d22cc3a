use thiserror::Error;

/// Errors produced by content codecs and their registries.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("no content provider registered for type {0:?}")]
    NotFound(String),

    #[error("failed to decode {content_type} content: {reason}")]
    Decode { content_type: String, reason: String },

    #[error("failed to encode {content_type} content: {reason}")]
    Encode { content_type: String, reason: String },

    #[error("invalid file pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ContentError>;
