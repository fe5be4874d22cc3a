use regex::Regex;
use serde_json::Value;

use doclake_types::DataLakePath;

use crate::error::{GraphError, Result};

/// A mounted source file contributing a subtree to the graph.
#[derive(Clone, Debug)]
pub struct Manifest {
    /// Absolute URI the manifest was loaded from.
    pub uri: String,
    /// Content type used to pick the codec.
    pub content_type: String,
    /// Decoded document.
    pub document: Value,
}

impl Manifest {
    /// Returns `true` if this manifest defines a node at `path`.
    pub fn defines(&self, path: &DataLakePath) -> bool {
        self.document.pointer(&path.as_pointer()).is_some()
    }

    /// Relative URIs declared under the manifest's `imports` key.
    ///
    /// A missing key means no imports. Anything other than an array of
    /// strings is a malformed declaration.
    pub fn imports(&self) -> Result<Vec<String>> {
        match self.document.get("imports") {
            None => Ok(Vec::new()),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(|entry| {
                    entry.as_str().map(str::to_string).ok_or_else(|| GraphError::BadImports {
                        uri: self.uri.clone(),
                        reason: "imports entries must be strings".to_string(),
                    })
                })
                .collect(),
            Some(_) => Err(GraphError::BadImports {
                uri: self.uri.clone(),
                reason: "imports must be an array".to_string(),
            }),
        }
    }
}

/// Selector for [`ManifestGraph::reload`].
///
/// [`ManifestGraph::reload`]: crate::graph::ManifestGraph::reload
#[derive(Clone, Debug)]
pub enum ReloadPattern {
    /// Exact URI match.
    One(String),
    /// Any of several exact URIs.
    Many(Vec<String>),
    /// Regular expression over the URI.
    Regex(Regex),
}

impl ReloadPattern {
    /// Compile a regex-based pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| GraphError::BadPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Returns `true` if the pattern selects `uri`.
    pub fn matches(&self, uri: &str) -> bool {
        match self {
            Self::One(exact) => exact == uri,
            Self::Many(exacts) => exacts.iter().any(|e| e == uri),
            Self::Regex(regex) => regex.is_match(uri),
        }
    }
}

impl From<&str> for ReloadPattern {
    fn from(uri: &str) -> Self {
        Self::One(uri.to_string())
    }
}

impl From<String> for ReloadPattern {
    fn from(uri: String) -> Self {
        Self::One(uri)
    }
}

impl From<Vec<String>> for ReloadPattern {
    fn from(uris: Vec<String>) -> Self {
        Self::Many(uris)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(document: Value) -> Manifest {
        Manifest {
            uri: "memory://root.json".to_string(),
            content_type: "application/json".to_string(),
            document,
        }
    }

    #[test]
    fn defines_checks_pointer() {
        let m = manifest(json!({"docs": {"welcome": {"title": "Hi"}}}));
        assert!(m.defines(&DataLakePath::parse("/docs/welcome").unwrap()));
        assert!(!m.defines(&DataLakePath::parse("/docs/missing").unwrap()));
    }

    #[test]
    fn imports_parse_and_reject_malformed() {
        assert_eq!(
            manifest(json!({"imports": ["a.json", "b.json"]})).imports().unwrap(),
            vec!["a.json".to_string(), "b.json".to_string()]
        );
        assert!(manifest(json!({})).imports().unwrap().is_empty());
        assert!(manifest(json!({"imports": "a.json"})).imports().is_err());
        assert!(manifest(json!({"imports": [1]})).imports().is_err());
    }

    #[test]
    fn pattern_matching() {
        assert!(ReloadPattern::from("memory://a.json").matches("memory://a.json"));
        assert!(!ReloadPattern::from("memory://a.json").matches("memory://b.json"));
        assert!(ReloadPattern::from(vec!["memory://a.json".to_string()])
            .matches("memory://a.json"));
        assert!(ReloadPattern::regex(r"\.json$").unwrap().matches("memory://a.json"));
        assert!(ReloadPattern::regex("[").is_err());
    }
}
