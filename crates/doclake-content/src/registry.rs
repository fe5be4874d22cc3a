use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;
use tracing::debug;

use crate::error::{ContentError, Result};
use crate::provider::ContentProvider;

/// Strip content-type parameters (`;charset=...`) and surrounding space.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// Maps content types to registered provider instances.
///
/// Same discipline as the protocol registry: `register` silently replaces,
/// `get` fails with [`ContentError::NotFound`] on a miss. Lookups normalize
/// the key, so `application/json;charset=utf-8` finds the provider
/// registered under `application/json`.
pub struct ContentProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn ContentProvider>>>,
}

impl ContentProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider for a content type, replacing any previous one.
    pub fn register(&self, content_type: impl AsRef<str>, provider: Arc<dyn ContentProvider>) {
        let key = normalize_content_type(content_type.as_ref());
        debug!(content_type = %key, "registering content provider");
        self.providers
            .write()
            .expect("registry lock poisoned")
            .insert(key, provider);
    }

    /// Look up a provider by content type.
    pub fn get(&self, content_type: &str) -> Result<Arc<dyn ContentProvider>> {
        let key = normalize_content_type(content_type);
        self.providers
            .read()
            .expect("registry lock poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(key))
    }

    /// Sorted list of registered content types.
    pub fn fetch(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .providers
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

impl Default for ContentProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentProviderRegistry")
            .field("content_types", &self.fetch())
            .finish()
    }
}

/// Maps file-path patterns to content types.
///
/// A registered pattern takes precedence over the content type reported by
/// the transport. Later registrations are checked first, so more specific
/// patterns can shadow earlier ones.
pub struct FileContentTypeRegistry {
    entries: RwLock<Vec<(Regex, String)>>,
}

impl FileContentTypeRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a pattern (a regular expression over the full file path).
    pub fn register(&self, pattern: &str, content_type: impl Into<String>) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|e| ContentError::BadPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.entries
            .write()
            .expect("registry lock poisoned")
            .push((regex, content_type.into()));
        Ok(())
    }

    /// Content type for a file path, if any pattern matches.
    pub fn content_type_for(&self, file: &str) -> Option<String> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .iter()
            .rev()
            .find(|(regex, _)| regex.is_match(file))
            .map(|(_, ct)| ct.clone())
    }
}

impl Default for FileContentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::JsonContentProvider;

    #[test]
    fn get_unregistered_type_fails() {
        let registry = ContentProviderRegistry::new();
        assert!(matches!(
            registry.get("text/markdown").err().unwrap(),
            ContentError::NotFound(t) if t == "text/markdown"
        ));
    }

    #[test]
    fn lookup_normalizes_parameters_and_case() {
        let registry = ContentProviderRegistry::new();
        registry.register("application/json", Arc::new(JsonContentProvider::new()));
        assert!(registry.get("application/json;charset=utf-8").is_ok());
        assert!(registry.get("Application/JSON").is_ok());
    }

    #[test]
    fn register_overwrites_silently() {
        let registry = ContentProviderRegistry::new();
        registry.register("application/json", Arc::new(JsonContentProvider::new()));
        registry.register("application/json", Arc::new(JsonContentProvider::new()));
        assert_eq!(registry.fetch(), vec!["application/json".to_string()]);
    }

    #[test]
    fn file_patterns_beat_registration_order() {
        let registry = FileContentTypeRegistry::new();
        registry.register(r"\.json$", "application/json").unwrap();
        registry.register(r"dochub\.json$", "application/dochub+json").unwrap();
        assert_eq!(
            registry.content_type_for("root/dochub.json").as_deref(),
            Some("application/dochub+json")
        );
        assert_eq!(
            registry.content_type_for("other.json").as_deref(),
            Some("application/json")
        );
        assert!(registry.content_type_for("readme.txt").is_none());
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let registry = FileContentTypeRegistry::new();
        assert!(matches!(
            registry.register("(", "x").unwrap_err(),
            ContentError::BadPattern { .. }
        ));
    }
}
