use async_trait::async_trait;
use serde_json::Value;

use doclake_types::DataLakeChange;

use crate::error::Result;

/// Context handed to a provider at registration time.
#[derive(Clone, Debug, Default)]
pub struct BootstrapContext {
    pub root_manifest: Option<String>,
}

/// A bidirectional codec between raw file content and graph objects.
///
/// Implementations must satisfy:
///
/// - `to_object(to_content(x))` is deep-equal to `x` for every `x` the
///   provider accepts (round-trip).
/// - `mutation` is a pure textual transform: same content + same changes
///   always yields the same output, so retries after a failed commit are
///   safe.
/// - Providers never touch I/O; they only transform in-memory content.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Returns `true` once the provider is ready for use.
    fn is_active(&self) -> bool;

    /// Called by the engine when the provider is registered.
    async fn bootstrap(&self, context: &BootstrapContext) -> Result<()>;

    /// Decode raw content into a graph object.
    fn to_object(&self, content: &str) -> Result<Value>;

    /// Encode a graph object into storable content.
    fn to_content(&self, data: &Value) -> Result<String>;

    /// Apply a change list to content, returning the mutated content.
    fn mutation(&self, content: &str, changes: &[DataLakeChange]) -> Result<String>;
}
