//! Content codecs for the doclake engine.
//!
//! A [`ContentProvider`] translates between raw file content and graph
//! objects, and can apply a change list as a textual mutation. The
//! [`ContentProviderRegistry`] maps content types to provider instances;
//! [`FileContentTypeRegistry`] maps file-path patterns to content types,
//! taking precedence over whatever the transport reports.
//!
//! The mutation contract is a pure textual transform: the same input content
//! plus the same change list always produces the same output content, so a
//! failed commit can be retried safely.

pub mod error;
pub mod json;
pub mod provider;
pub mod registry;
pub mod toml_provider;

pub use error::{ContentError, Result};
pub use json::JsonContentProvider;
pub use provider::{BootstrapContext, ContentProvider};
pub use registry::{ContentProviderRegistry, FileContentTypeRegistry};
pub use toml_provider::TomlContentProvider;

use serde_json::Value;

use doclake_types::{ChangeAction, DataLakeChange};

/// Apply a change list to a decoded document in place.
///
/// `Update` deep-sets the value at the change path, creating intermediate
/// objects as needed; `Remove` deletes the key, leaving empty parents
/// behind. Shared by both built-in providers, which differ only in their
/// textual encoding.
pub fn apply_changes(document: &mut Value, changes: &[DataLakeChange]) -> Result<()> {
    for change in changes {
        let segments = change.path.segments();
        match change.action {
            ChangeAction::Update => {
                let mut node = &mut *document;
                for segment in &segments[..segments.len() - 1] {
                    if !node.is_object() {
                        *node = Value::Object(Default::default());
                    }
                    node = node
                        .as_object_mut()
                        .expect("just coerced to object")
                        .entry(segment.clone())
                        .or_insert(Value::Null);
                }
                if !node.is_object() {
                    *node = Value::Object(Default::default());
                }
                node.as_object_mut()
                    .expect("just coerced to object")
                    .insert(segments[segments.len() - 1].clone(), change.data.clone());
            }
            ChangeAction::Remove => {
                let parent = segments[..segments.len() - 1]
                    .iter()
                    .try_fold(&mut *document, |node, segment| node.get_mut(segment.as_str()));
                if let Some(map) = parent.and_then(Value::as_object_mut) {
                    map.remove(&segments[segments.len() - 1]);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doclake_types::DataLakePath;
    use serde_json::json;

    fn path(s: &str) -> DataLakePath {
        DataLakePath::parse(s).unwrap()
    }

    #[test]
    fn update_creates_intermediate_objects() {
        let mut doc = json!({});
        apply_changes(
            &mut doc,
            &[DataLakeChange::update(path("/docs/welcome/title"), json!("Hi"), "")],
        )
        .unwrap();
        assert_eq!(doc, json!({"docs": {"welcome": {"title": "Hi"}}}));
    }

    #[test]
    fn update_replaces_scalar_parents() {
        let mut doc = json!({"docs": "scalar"});
        apply_changes(
            &mut doc,
            &[DataLakeChange::update(path("/docs/welcome"), json!(1), "")],
        )
        .unwrap();
        assert_eq!(doc, json!({"docs": {"welcome": 1}}));
    }

    #[test]
    fn remove_deletes_key_and_tolerates_missing() {
        let mut doc = json!({"docs": {"welcome": {"title": "Hi"}, "other": 1}});
        apply_changes(
            &mut doc,
            &[
                DataLakeChange::remove(path("/docs/welcome"), ""),
                DataLakeChange::remove(path("/docs/never/existed"), ""),
            ],
        )
        .unwrap();
        assert_eq!(doc, json!({"docs": {"other": 1}}));
    }

    #[test]
    fn remove_deep_leaf_keeps_siblings() {
        let mut doc = json!({"a": {"b": {"c": 1, "d": 2}}, "e": 3});
        apply_changes(&mut doc, &[DataLakeChange::remove(path("/a/b/c"), "")]).unwrap();
        assert_eq!(doc, json!({"a": {"b": {"d": 2}}, "e": 3}));
    }

    #[test]
    fn remove_through_scalar_parent_is_a_noop() {
        let mut doc = json!({"a": "scalar"});
        apply_changes(&mut doc, &[DataLakeChange::remove(path("/a/b/c"), "")]).unwrap();
        assert_eq!(doc, json!({"a": "scalar"}));
    }
}
