use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a pending mutation does to its file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileMutationKind {
    /// Replace the file content wholesale.
    Put { content: String },
    /// Delete the file.
    Delete,
    /// Move the file to a new URI.
    Move { to: String },
}

/// One pending version of a file inside a transaction.
///
/// Successive puts to the same URI accumulate as versions; each carries
/// the full file content as it would be after that mutation, so the
/// latest version per URI is the one that commits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileMutation {
    pub uid: Uuid,
    pub uri: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: FileMutationKind,
}

impl FileMutation {
    pub fn put(uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(uri, FileMutationKind::Put { content: content.into() })
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(uri, FileMutationKind::Delete)
    }

    pub fn rename(uri: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(uri, FileMutationKind::Move { to: to.into() })
    }

    fn new(uri: impl Into<String>, kind: FileMutationKind) -> Self {
        Self {
            uid: Uuid::now_v7(),
            uri: uri.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Content carried by this version, for puts.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            FileMutationKind::Put { content } => Some(content),
            _ => None,
        }
    }
}
