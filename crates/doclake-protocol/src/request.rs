use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Methods a driver may expose over a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProtocolMethod {
    // Classic verbs
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    // Extended resource methods
    /// Resource metadata, including folder listings.
    Scan,
    /// Version history of a resource.
    Versions,
    /// Batched file mutation with a structured action list.
    Commit,
    /// Push previously committed mutations to the backing store.
    Push,
    /// Branch creation.
    Checkout,
}

impl std::fmt::Display for ProtocolMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Scan => "SCAN",
            Self::Versions => "VERSIONS",
            Self::Commit => "COMMIT",
            Self::Push => "PUSH",
            Self::Checkout => "CHECKOUT",
        };
        f.write_str(s)
    }
}

/// One entry in a `COMMIT` batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CommitAction {
    /// Create or replace the file at `uri` with `content`.
    Post { uri: String, content: String },
    /// Delete the file at `uri`.
    Delete { uri: String },
    /// Rename the file at `from` to `to`.
    Rename { from: String, to: String },
}

/// Metadata for a single file returned by `SCAN`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFileMeta {
    pub name: String,
    pub content_type: String,
}

/// Metadata returned by a `SCAN` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceMeta {
    File(ResourceFileMeta),
    Folder { files: Vec<ResourceFileMeta> },
    Other,
}

/// A generic resource request dispatched to a driver.
#[derive(Clone, Debug)]
pub struct RequestConfig {
    pub uri: String,
    pub method: ProtocolMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    /// Action list for `COMMIT` requests; empty otherwise.
    pub actions: Vec<CommitAction>,
    /// Commit message for `COMMIT`/`PUSH`, when the backend records one.
    pub comment: Option<String>,
}

impl RequestConfig {
    pub fn new(method: ProtocolMethod, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            actions: Vec::new(),
            comment: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(ProtocolMethod::Get, uri)
    }

    pub fn put(uri: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut config = Self::new(ProtocolMethod::Put, uri);
        config.body = Some(body.into());
        config
    }

    pub fn commit(uri: impl Into<String>, actions: Vec<CommitAction>, comment: Option<String>) -> Self {
        let mut config = Self::new(ProtocolMethod::Commit, uri);
        config.actions = actions;
        config.comment = comment;
        config
    }
}

/// A driver's answer to a resource request.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// Content type reported by the transport, if any.
    pub content_type: Option<String>,
}

impl Response {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: body.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Body decoded as UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&ProtocolMethod::Scan).unwrap(), "\"SCAN\"");
        assert_eq!(serde_json::to_string(&ProtocolMethod::Checkout).unwrap(), "\"CHECKOUT\"");
    }

    #[test]
    fn commit_actions_tag_by_action() {
        let action = CommitAction::Rename {
            from: "a.yaml".into(),
            to: "b.yaml".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "rename");
    }

    #[test]
    fn request_builders() {
        let put = RequestConfig::put("memory://root.json", "{}");
        assert_eq!(put.method, ProtocolMethod::Put);
        assert_eq!(put.body.as_deref(), Some(b"{}".as_slice()));

        let commit = RequestConfig::commit(
            "memory://",
            vec![CommitAction::Delete { uri: "memory://old.json".into() }],
            Some("drop old".into()),
        );
        assert_eq!(commit.actions.len(), 1);
        assert_eq!(commit.comment.as_deref(), Some("drop old"));
    }
}
