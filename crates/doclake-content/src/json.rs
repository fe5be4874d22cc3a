use async_trait::async_trait;
use serde_json::Value;

use doclake_types::DataLakeChange;

use crate::apply_changes;
use crate::error::{ContentError, Result};
use crate::provider::{BootstrapContext, ContentProvider};

/// JSON codec backed by `serde_json`.
///
/// Output is pretty-printed with a trailing newline so stored manifests diff
/// cleanly. `serde_json` keeps object key order, which together with the
/// deterministic printer makes `mutation` a pure textual transform.
#[derive(Debug, Default)]
pub struct JsonContentProvider;

impl JsonContentProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentProvider for JsonContentProvider {
    fn is_active(&self) -> bool {
        true
    }

    async fn bootstrap(&self, _context: &BootstrapContext) -> Result<()> {
        Ok(())
    }

    fn to_object(&self, content: &str) -> Result<Value> {
        serde_json::from_str(content).map_err(|e| ContentError::Decode {
            content_type: "application/json".to_string(),
            reason: e.to_string(),
        })
    }

    fn to_content(&self, data: &Value) -> Result<String> {
        let mut content = serde_json::to_string_pretty(data).map_err(|e| ContentError::Encode {
            content_type: "application/json".to_string(),
            reason: e.to_string(),
        })?;
        content.push('\n');
        Ok(content)
    }

    fn mutation(&self, content: &str, changes: &[DataLakeChange]) -> Result<String> {
        let mut document = self.to_object(content)?;
        apply_changes(&mut document, changes)?;
        self.to_content(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doclake_types::DataLakePath;
    use serde_json::json;

    #[test]
    fn round_trip_preserves_value() {
        let provider = JsonContentProvider::new();
        let value = json!({"docs": {"welcome": {"title": "Hi", "tags": ["a", "b"], "n": 3}}});
        let content = provider.to_content(&value).unwrap();
        assert!(content.ends_with('\n'));
        assert_eq!(provider.to_object(&content).unwrap(), value);
    }

    #[test]
    fn mutation_is_deterministic() {
        let provider = JsonContentProvider::new();
        let content = provider.to_content(&json!({"docs": {}})).unwrap();
        let changes = vec![DataLakeChange::update(
            DataLakePath::parse("/docs/welcome").unwrap(),
            json!({"title": "Hi"}),
            "add welcome",
        )];
        let once = provider.mutation(&content, &changes).unwrap();
        let twice = provider.mutation(&content, &changes).unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            provider.to_object(&once).unwrap(),
            json!({"docs": {"welcome": {"title": "Hi"}}})
        );
    }

    #[test]
    fn decode_failure_reports_reason() {
        let provider = JsonContentProvider::new();
        let err = provider.to_object("{not json").unwrap_err();
        assert!(matches!(err, ContentError::Decode { .. }));
    }
}
