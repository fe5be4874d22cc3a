use thiserror::Error;

pub type Result<T> = std::result::Result<T, FollowError>;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("invalid pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },
}
