use std::sync::RwLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// A registered presentation component for some content types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorDescriptor {
    /// URI of the component implementing the editor.
    pub component: String,
    /// Human-readable name shown in pickers.
    pub title: String,
}

/// A registered comparison component for some content types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferDescriptor {
    pub component: String,
    pub title: String,
}

struct Entry<T> {
    pattern: String,
    regex: Regex,
    descriptor: T,
}

/// Content-type pattern registry with a default fallback.
///
/// Lookup picks the matching entry with the longest pattern, on the
/// theory that a longer expression is the more specific claim. Editors
/// and differs share this shape.
pub struct PatternRegistry<T> {
    entries: RwLock<Vec<Entry<T>>>,
    fallback: RwLock<Option<T>>,
}

impl<T: Clone> PatternRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            fallback: RwLock::new(None),
        }
    }

    /// Register a descriptor for content types matching `pattern`.
    /// Re-registering a pattern replaces the previous descriptor.
    pub fn register(&self, pattern: &str, descriptor: T) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|e| {
            SdkError::InvalidOperation(format!("invalid pattern {pattern:?}: {e}"))
        })?;
        let mut entries = self.entries.write().expect("registry lock poisoned");
        entries.retain(|entry| entry.pattern != pattern);
        entries.push(Entry {
            pattern: pattern.to_string(),
            regex,
            descriptor,
        });
        Ok(())
    }

    /// Register the descriptor used when nothing else matches.
    pub fn register_default(&self, descriptor: T) {
        *self.fallback.write().expect("registry lock poisoned") = Some(descriptor);
    }

    /// Most specific descriptor for `content_type`, or the default.
    pub fn lookup(&self, content_type: &str) -> Option<T> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .iter()
            .filter(|entry| entry.regex.is_match(content_type))
            .max_by_key(|entry| entry.pattern.len())
            .map(|entry| entry.descriptor.clone())
            .or_else(|| self.fallback.read().expect("registry lock poisoned").clone())
    }

    /// Every registered pattern with its descriptor.
    pub fn fetch(&self) -> Vec<(String, T)> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .iter()
            .map(|entry| (entry.pattern.clone(), entry.descriptor.clone()))
            .collect()
    }
}

impl<T: Clone> Default for PatternRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PatternRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().expect("registry lock poisoned");
        f.debug_struct("PatternRegistry")
            .field("patterns", &entries.iter().map(|e| &e.pattern).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(name: &str) -> EditorDescriptor {
        EditorDescriptor {
            component: format!("memory://editors/{name}.js"),
            title: name.to_string(),
        }
    }

    #[test]
    fn longest_pattern_wins() {
        let registry = PatternRegistry::new();
        registry.register("^application/.*", editor("generic")).unwrap();
        registry
            .register("^application/json$", editor("json"))
            .unwrap();

        assert_eq!(
            registry.lookup("application/json").unwrap().title,
            "json"
        );
        assert_eq!(
            registry.lookup("application/toml").unwrap().title,
            "generic"
        );
    }

    #[test]
    fn default_covers_unmatched_types() {
        let registry = PatternRegistry::new();
        assert!(registry.lookup("text/plain").is_none());

        registry.register_default(editor("fallback"));
        assert_eq!(registry.lookup("text/plain").unwrap().title, "fallback");
    }

    #[test]
    fn reregistration_replaces_and_fetch_lists() {
        let registry = PatternRegistry::new();
        registry.register("^text/.*", editor("one")).unwrap();
        registry.register("^text/.*", editor("two")).unwrap();

        let all = registry.fetch();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.title, "two");
        assert!(registry.register("[", editor("bad")).is_err());
    }
}
