use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::DataLakePath;

/// Action applied by a [`DataLakeChange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Write (or overwrite) data at the path.
    Update,
    /// Delete the node at the path.
    Remove,
}

/// The atomic unit of mutation against the data lake.
///
/// For `Remove` actions the `data` field is ignored. `target_file` pins the
/// manifest the change lands in; when absent, the engine infers the owning
/// manifest from the path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataLakeChange {
    pub action: ChangeAction,
    pub path: DataLakePath,
    #[serde(default)]
    pub data: Value,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file: Option<String>,
}

impl DataLakeChange {
    /// An update change writing `data` at `path`.
    pub fn update(path: DataLakePath, data: Value, comment: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Update,
            path,
            data,
            comment: comment.into(),
            target_file: None,
        }
    }

    /// A remove change deleting the node at `path`.
    pub fn remove(path: DataLakePath, comment: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Remove,
            path,
            data: Value::Null,
            comment: comment.into(),
            target_file: None,
        }
    }

    /// Pin the change to an explicit manifest file.
    pub fn with_target_file(mut self, uri: impl Into<String>) -> Self {
        self.target_file = Some(uri.into());
        self
    }
}
