use serde::{Deserialize, Serialize};

use crate::path::DataLakePath;

/// A data-level issue surfaced for human review.
///
/// Problems flow through the problem channel rather than being thrown:
/// schema mismatches and broken references discovered while refreshing
/// content are collected passively for later batch review, while thrown
/// errors stay reserved for programmer-facing contract violations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Stable identifier for deduplication across refreshes.
    pub uid: String,
    pub title: String,
    pub description: String,
    /// URI of the resource the problem was found in, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Graph paths affected by the problem.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<DataLakePath>,
    /// Suggested correction, if one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

impl Problem {
    pub fn new(uid: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            description: description.into(),
            location: None,
            paths: Vec::new(),
            correction: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_path(mut self, path: DataLakePath) -> Self {
        self.paths.push(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_populates_fields() {
        let problem = Problem::new("p-1", "broken link", "target does not exist")
            .with_location("memory://root.json")
            .with_path(DataLakePath::parse("/docs/welcome").unwrap());
        assert_eq!(problem.uid, "p-1");
        assert_eq!(problem.location.as_deref(), Some("memory://root.json"));
        assert_eq!(problem.paths.len(), 1);
    }
}
