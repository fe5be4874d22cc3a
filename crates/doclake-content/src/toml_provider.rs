use async_trait::async_trait;
use serde_json::Value;

use doclake_types::DataLakeChange;

use crate::apply_changes;
use crate::error::{ContentError, Result};
use crate::provider::{BootstrapContext, ContentProvider};

const CONTENT_TYPE: &str = "application/toml";

/// TOML codec backed by the `toml` crate.
///
/// Values pass through `serde_json::Value`, the common graph node type.
/// TOML cannot represent `null` or non-table roots, so such documents are
/// rejected at encode time rather than silently coerced.
#[derive(Debug, Default)]
pub struct TomlContentProvider;

impl TomlContentProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentProvider for TomlContentProvider {
    fn is_active(&self) -> bool {
        true
    }

    async fn bootstrap(&self, _context: &BootstrapContext) -> Result<()> {
        Ok(())
    }

    fn to_object(&self, content: &str) -> Result<Value> {
        let table: toml::Value = content.parse().map_err(|e: toml::de::Error| ContentError::Decode {
            content_type: CONTENT_TYPE.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::to_value(table).map_err(|e| ContentError::Decode {
            content_type: CONTENT_TYPE.to_string(),
            reason: e.to_string(),
        })
    }

    fn to_content(&self, data: &Value) -> Result<String> {
        if !data.is_object() {
            return Err(ContentError::Encode {
                content_type: CONTENT_TYPE.to_string(),
                reason: "TOML documents must have a table at the root".to_string(),
            });
        }
        toml::to_string_pretty(data).map_err(|e| ContentError::Encode {
            content_type: CONTENT_TYPE.to_string(),
            reason: e.to_string(),
        })
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
        let provider = TomlContentProvider::new();
        let value = json!({"docs": {"welcome": {"title": "Hi", "count": 2}}});
        let content = provider.to_content(&value).unwrap();
        assert_eq!(provider.to_object(&content).unwrap(), value);
    }

    #[test]
    fn non_table_root_is_rejected() {
        let provider = TomlContentProvider::new();
        assert!(matches!(
            provider.to_content(&json!(42)).unwrap_err(),
            ContentError::Encode { .. }
        ));
    }

    #[test]
    fn mutation_applies_remove() {
        let provider = TomlContentProvider::new();
        let content = provider
            .to_content(&json!({"docs": {"welcome": {"title": "Hi"}, "keep": 1}}))
            .unwrap();
        let mutated = provider
            .mutation(
                &content,
                &[DataLakeChange::remove(
                    DataLakePath::parse("/docs/welcome").unwrap(),
                    "drop",
                )],
            )
            .unwrap();
        assert_eq!(provider.to_object(&mutated).unwrap(), json!({"docs": {"keep": 1}}));
    }
}
