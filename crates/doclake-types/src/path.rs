use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Characters allowed inside a path segment.
fn is_segment_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '.')
}

/// A `/`-delimited address of a node in the merged data graph.
///
/// The grammar is `(/segment)+` where a segment is one or more of
/// `[a-zA-Z0-9_$.]`. Construction validates the input; a `DataLakePath` that
/// exists is always well-formed. The string form doubles as a JSON pointer
/// into the merged graph document.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataLakePath {
    segments: Vec<String>,
}

impl DataLakePath {
    /// Parse and validate a path string.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let fail = |reason: &str| TypeError::PathFormat {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        if input.is_empty() {
            return Err(fail("path must not be empty"));
        }
        if !input.starts_with('/') {
            return Err(fail("path must start with '/'"));
        }
        let mut segments = Vec::new();
        for segment in input[1..].split('/') {
            if segment.is_empty() {
                return Err(fail("path must not contain empty segments"));
            }
            if let Some(ch) = segment.chars().find(|ch| !is_segment_char(*ch)) {
                return Err(fail(&format!("segment contains forbidden character {ch:?}")));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// The path segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The parent path, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append a validated segment, producing a child path.
    pub fn join(&self, segment: &str) -> Result<Self, TypeError> {
        if segment.is_empty() || !segment.chars().all(is_segment_char) {
            return Err(TypeError::PathFormat {
                input: segment.to_string(),
                reason: "invalid path segment".to_string(),
            });
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Returns `true` if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &DataLakePath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// The path rendered as a JSON pointer (identical to its string form).
    pub fn as_pointer(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DataLakePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DataLakePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataLakePath({self})")
    }
}

impl FromStr for DataLakePath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DataLakePath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for DataLakePath {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DataLakePath> for String {
    fn from(path: DataLakePath) -> Self {
        path.to_string()
    }
}
