use serde_json::Value;

/// Merge `overlay` into `base` following lake precedence rules.
///
/// Object nodes merge key-wise, recursing into shared keys. Arrays and
/// scalars are replaced wholesale by the overlay. The overlay always
/// represents the higher-precedence (later-mounted) manifest.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Fold a sequence of documents, in mount order, into one merged graph.
pub fn merge_all<'a>(documents: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut merged = Value::Object(Default::default());
    for document in documents {
        deep_merge(&mut merged, document);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_merge_key_wise() {
        let a = json!({"docs": {"welcome": {"title": "Hi"}}});
        let b = json!({"docs": {"welcome": {"body": "text"}}});
        let merged = merge_all([&a, &b]);
        assert_eq!(merged, json!({"docs": {"welcome": {"title": "Hi", "body": "text"}}}));
    }

    #[test]
    fn scalars_and_arrays_replaced_wholesale() {
        let a = json!({"title": "old", "tags": ["x", "y"], "n": 1});
        let b = json!({"title": "new", "tags": ["z"]});
        let merged = merge_all([&a, &b]);
        assert_eq!(merged, json!({"title": "new", "tags": ["z"], "n": 1}));
    }

    #[test]
    fn later_mounts_win_at_conflicting_leaves() {
        let a = json!({"docs": {"welcome": {"title": "first"}}});
        let b = json!({"docs": {"welcome": {"title": "second"}}});
        let merged = merge_all([&a, &b]);
        assert_eq!(merged["docs"]["welcome"]["title"], "second");
    }

    #[test]
    fn type_conflict_takes_overlay() {
        let a = json!({"docs": {"welcome": "scalar"}});
        let b = json!({"docs": {"welcome": {"title": "Hi"}}});
        let merged = merge_all([&a, &b]);
        assert_eq!(merged, json!({"docs": {"welcome": {"title": "Hi"}}}));
    }
}
