use async_trait::async_trait;

use crate::error::Result;
use crate::request::{ProtocolMethod, RequestConfig, Response};

/// Context handed to a driver at registration time.
///
/// Carries the host-level knobs a transport needs before serving requests.
/// Kept deliberately small: drivers that need richer configuration read it
/// from their own constructors.
#[derive(Clone, Debug, Default)]
pub struct BootstrapContext {
    /// URI of the root manifest, when already known.
    pub root_manifest: Option<String>,
}

/// A pluggable transport serving resource requests for one URI scheme.
///
/// Implementations must be thread-safe (`Send + Sync`). The engine never
/// assumes anything about a driver beyond this contract:
///
/// - `request` is the single entry point for all methods; a driver that
///   receives a method it did not advertise may reject it.
/// - `available_methods_for` is per-URI: the same driver may expose
///   different methods for different resources (e.g. read-only folders).
/// - All I/O failures surface as [`ProtocolError::Transport`] and are opaque
///   to the engine.
///
/// [`ProtocolError::Transport`]: crate::error::ProtocolError::Transport
#[async_trait]
pub trait ProtocolDriver: Send + Sync {
    /// Returns `true` once the driver is ready to serve requests.
    fn is_active(&self) -> bool;

    /// Called by the engine when the driver is registered.
    async fn bootstrap(&self, context: &BootstrapContext) -> Result<()>;

    /// Resolve a sequence of absolute/relative references into a URI in the
    /// driver's own format.
    fn resolve_url(&self, parts: &[&str]) -> Result<String>;

    /// Execute a resource request.
    async fn request(&self, config: RequestConfig) -> Result<Response>;

    /// Methods the driver supports for the given resource.
    async fn available_methods_for(&self, uri: &str) -> Result<Vec<ProtocolMethod>>;

    /// Extract the host component from a URI in the driver's format.
    fn extract_host(&self, uri: &str) -> Option<String>;
}
