use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use doclake_types::DataLakePath;

use crate::error::{QueryError, Result};

/// File extensions recognized as data file references.
const DATA_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

/// A data source, discriminated once at ingestion.
///
/// The original contract distinguished sources by string shape on every
/// use; here the shape is computed once and carried as a closed union.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    /// Data that needs no processing.
    Literal(Value),
    /// An inline query, from `(expr)` or `jsonata(expr)`.
    InlineQuery(String),
    /// A query loaded from a `*.jsonata` file.
    QueryFile(String),
    /// A reference to a data file.
    DataFile(String),
    /// A bare lake path resolved against the merged graph.
    LakePath(DataLakePath),
}

impl SourceKind {
    /// Classify a raw profile source value.
    pub fn ingest(value: &Value) -> Result<Self> {
        let Value::String(text) = value else {
            return Ok(Self::Literal(value.clone()));
        };
        let trimmed = text.trim();
        if let Some(inner) = trimmed
            .strip_prefix("jsonata(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(Self::InlineQuery(inner.to_string()));
        }
        if let Some(inner) = trimmed.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
            return Ok(Self::InlineQuery(inner.to_string()));
        }
        if trimmed.ends_with(".jsonata") {
            return Ok(Self::QueryFile(trimmed.to_string()));
        }
        if let Ok(path) = DataLakePath::parse(trimmed) {
            return Ok(Self::LakePath(path));
        }
        let extension = trimmed.rsplit('.').next().unwrap_or("");
        if DATA_EXTENSIONS.contains(&extension) {
            return Ok(Self::DataFile(trimmed.to_string()));
        }
        Err(QueryError::BadSource(trimmed.to_string()))
    }
}

/// Raw `origin` declaration of a profile.
///
/// Either one source, bound as `$origin`, or a named map of sources each
/// bound under its own name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OriginSet {
    Named(BTreeMap<String, Value>),
    Single(Value),
}

/// A declarative description of how to obtain a data set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSetProfile {
    /// Optional bindings resolved before `source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginSet>,
    /// The source evaluated with the origin bindings in scope.
    pub source: Value,
}

impl DataSetProfile {
    /// A profile with a bare source and no origin.
    pub fn from_source(source: impl Into<Value>) -> Self {
        Self {
            origin: None,
            source: source.into(),
        }
    }
}
