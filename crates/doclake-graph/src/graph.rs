use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use doclake_content::{ContentProviderRegistry, FileContentTypeRegistry};
use doclake_protocol::{ProtocolError, ProtocolRegistry, RequestConfig};
use doclake_resolver::resolve_uri;
use doclake_types::{DataLakePath, InitStatus, LakeEvent};

use crate::error::{GraphError, Result};
use crate::manifest::{Manifest, ReloadPattern};
use crate::merge::merge_all;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Infer a content type from a URI's file extension.
fn content_type_by_extension(uri: &str) -> Option<String> {
    let ext = uri.rsplit('.').next()?;
    match ext {
        "json" => Some("application/json".to_string()),
        "toml" => Some("application/toml".to_string()),
        _ => None,
    }
}

#[derive(Default)]
struct State {
    /// Mounted manifests in mount order; later entries take precedence.
    manifests: Vec<Manifest>,
    /// The merged graph, rebuilt wholesale after every change.
    merged: Value,
}

impl State {
    fn remerge(&mut self) {
        self.merged = merge_all(self.manifests.iter().map(|m| &m.document));
    }

    fn position_of(&self, uri: &str) -> Option<usize> {
        self.manifests.iter().position(|m| m.uri == uri)
    }
}

/// The merged virtual data graph assembled from mounted manifests.
///
/// All I/O goes through the injected registries; the graph itself holds no
/// transport or codec logic. State lives behind a `RwLock` and is only
/// touched after fetches complete, so the lock is never held across an
/// await point.
pub struct ManifestGraph {
    protocols: Arc<ProtocolRegistry>,
    providers: Arc<ContentProviderRegistry>,
    file_types: Arc<FileContentTypeRegistry>,
    state: RwLock<State>,
    root: RwLock<Option<String>>,
    events: broadcast::Sender<LakeEvent>,
    status_tx: watch::Sender<InitStatus>,
    status_rx: watch::Receiver<InitStatus>,
}

impl ManifestGraph {
    pub fn new(
        protocols: Arc<ProtocolRegistry>,
        providers: Arc<ContentProviderRegistry>,
        file_types: Arc<FileContentTypeRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(InitStatus::UndefRootManifest);
        Self {
            protocols,
            providers,
            file_types,
            state: RwLock::new(State::default()),
            root: RwLock::new(None),
            events,
            status_tx,
            status_rx,
        }
    }

    /// Subscribe to reload and change events.
    pub fn subscribe(&self) -> broadcast::Receiver<LakeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: LakeEvent) {
        // A send error only means nobody is listening.
        let _ = self.events.send(event);
    }

    /// URI of the current root manifest, if initialization has started.
    pub fn root_manifest(&self) -> Option<String> {
        self.root.read().expect("graph lock poisoned").clone()
    }

    /// Current initialization status.
    pub fn init_status(&self) -> InitStatus {
        *self.status_rx.borrow()
    }

    /// Resolve once the graph reaches `Success`.
    ///
    /// With `immediately` set, fails at once when not yet ready instead of
    /// waiting.
    pub async fn when_ready(&self, immediately: bool) -> Result<()> {
        let mut rx = self.status_rx.clone();
        if rx.borrow().is_ready() {
            return Ok(());
        }
        if immediately {
            return Err(GraphError::Uninitialized(format!("{:?}", self.init_status())));
        }
        while rx.changed().await.is_ok() {
            if rx.borrow().is_ready() {
                return Ok(());
            }
        }
        Err(GraphError::Uninitialized("status channel closed".to_string()))
    }

    /// Initialize the lake from a root manifest URI.
    ///
    /// On success the status becomes `Success`; on failure it reflects
    /// whether the root was missing or merely broken, and the error is
    /// returned to the caller as well.
    pub async fn init(&self, root_uri: &str) -> Result<()> {
        *self.root.write().expect("graph lock poisoned") = Some(root_uri.to_string());
        let _ = self.status_tx.send(InitStatus::Unknown);
        info!(uri = %root_uri, "initializing data lake");
        match self.mount(root_uri).await {
            Ok(_) => {
                let _ = self.status_tx.send(InitStatus::Success);
                Ok(())
            }
            Err(e) => {
                let status = match &e {
                    GraphError::Protocol(ProtocolError::ResourceMissing(_)) => {
                        InitStatus::MissingRootManifest
                    }
                    _ => InitStatus::ErrorRootManifest,
                };
                warn!(uri = %root_uri, error = %e, "root manifest initialization failed");
                let _ = self.status_tx.send(status);
                Err(e)
            }
        }
    }

    /// Determine the content type for a resource.
    ///
    /// Registered file patterns take precedence over the transport's
    /// reported type; a file-extension fallback covers bare stores.
    fn content_type_for(&self, uri: &str, reported: Option<&str>) -> Result<String> {
        self.file_types
            .content_type_for(uri)
            .or_else(|| reported.map(str::to_string))
            .or_else(|| content_type_by_extension(uri))
            .ok_or_else(|| GraphError::UnknownContentType(uri.to_string()))
    }

    /// Fetch and decode one manifest.
    async fn fetch_manifest(&self, uri: &str) -> Result<Manifest> {
        let driver = self.protocols.driver_for_uri(uri)?;
        let response = driver.request(RequestConfig::get(uri)).await?;
        let content_type = self.content_type_for(uri, response.content_type.as_deref())?;
        let provider = self.providers.get(&content_type)?;
        let document = provider.to_object(&response.text())?;
        Ok(Manifest {
            uri: uri.to_string(),
            content_type,
            document,
        })
    }

    /// Mount a manifest and, transitively, everything it imports.
    ///
    /// Returns the URIs that were actually added or changed. Remounting an
    /// already-current manifest is a no-op for the graph and emits nothing.
    pub async fn mount(&self, uri: &str) -> Result<Vec<String>> {
        // Already-mounted manifests are not refetched, except the mount
        // target itself, which is always refreshed.
        let mut visited: HashSet<String> = {
            let state = self.state.read().expect("graph lock poisoned");
            state.manifests.iter().map(|m| m.uri.clone()).collect()
        };
        visited.remove(uri);

        let mut pending = vec![uri.to_string()];
        let mut loaded: Vec<Manifest> = Vec::new();
        while let Some(next) = pending.pop() {
            if !visited.insert(next.clone()) {
                continue;
            }
            let manifest = self.fetch_manifest(&next).await?;
            for import in manifest.imports()? {
                pending.push(resolve_uri(&[&manifest.uri, &import])?);
            }
            loaded.push(manifest);
        }

        let mut changed = Vec::new();
        {
            let mut state = self.state.write().expect("graph lock poisoned");
            for manifest in loaded {
                match state.position_of(&manifest.uri) {
                    Some(pos) => {
                        if state.manifests[pos].document != manifest.document {
                            changed.push(manifest.uri.clone());
                            state.manifests[pos] = manifest;
                        }
                    }
                    None => {
                        changed.push(manifest.uri.clone());
                        state.manifests.push(manifest);
                    }
                }
            }
            if !changed.is_empty() {
                state.remerge();
            }
        }
        if !changed.is_empty() {
            debug!(uris = ?changed, "manifests mounted");
            self.emit(LakeEvent::Changed { uris: changed.clone() });
        }
        Ok(changed)
    }

    /// Unmount a manifest, removing its contribution from the graph.
    pub async fn unmount(&self, uri: &str) -> Result<()> {
        {
            let mut state = self.state.write().expect("graph lock poisoned");
            let pos = state
                .position_of(uri)
                .ok_or_else(|| GraphError::NotMounted(uri.to_string()))?;
            state.manifests.remove(pos);
            state.remerge();
        }
        debug!(uri = %uri, "manifest unmounted");
        self.emit(LakeEvent::Changed { uris: vec![uri.to_string()] });
        Ok(())
    }

    /// Re-fetch and re-merge manifests whose URI matches `pattern`.
    ///
    /// `None` reloads everything. Reloading an already-current manifest
    /// produces no observable graph change and no `Changed` event.
    /// Returns the URIs whose content actually changed.
    pub async fn reload(&self, pattern: Option<ReloadPattern>) -> Result<Vec<String>> {
        self.emit(LakeEvent::ReloadingStart);
        let targets: Vec<String> = {
            let state = self.state.read().expect("graph lock poisoned");
            state
                .manifests
                .iter()
                .map(|m| m.uri.clone())
                .filter(|uri| pattern.as_ref().map_or(true, |p| p.matches(uri)))
                .collect()
        };

        let mut fetched = Vec::new();
        for uri in &targets {
            fetched.push(self.fetch_manifest(uri).await?);
        }

        let mut changed = Vec::new();
        {
            let mut state = self.state.write().expect("graph lock poisoned");
            for manifest in fetched {
                if let Some(pos) = state.position_of(&manifest.uri) {
                    if state.manifests[pos].document != manifest.document {
                        changed.push(manifest.uri.clone());
                        state.manifests[pos] = manifest;
                    }
                }
            }
            if !changed.is_empty() {
                state.remerge();
            }
        }
        if !changed.is_empty() {
            info!(count = changed.len(), "reload applied manifest changes");
            self.emit(LakeEvent::Changed { uris: changed.clone() });
        }
        self.emit(LakeEvent::ReloadingFinish);
        Ok(changed)
    }

    /// Node of the merged graph at `path`, if defined.
    pub fn resolve(&self, path: &DataLakePath) -> Option<Value> {
        let state = self.state.read().expect("graph lock poisoned");
        state.merged.pointer(&path.as_pointer()).cloned()
    }

    /// A snapshot of the whole merged graph.
    pub fn snapshot(&self) -> Value {
        self.state.read().expect("graph lock poisoned").merged.clone()
    }

    /// Every manifest URI in which `path` is defined, in merge precedence
    /// order (later entries override earlier ones).
    pub fn uris_for_path(&self, path: &DataLakePath) -> Vec<String> {
        let state = self.state.read().expect("graph lock poisoned");
        state
            .manifests
            .iter()
            .filter(|m| m.defines(path))
            .map(|m| m.uri.clone())
            .collect()
    }

    /// The manifest that owns `path`: the highest-precedence manifest
    /// defining the path or its nearest defined ancestor.
    pub fn owner_for_path(&self, path: &DataLakePath) -> Option<String> {
        let mut probe = Some(path.clone());
        while let Some(current) = probe {
            if let Some(owner) = self.uris_for_path(&current).pop() {
                return Some(owner);
            }
            probe = current.parent();
        }
        None
    }

    /// List of currently mounted manifest URIs, in mount order.
    pub fn mounted_uris(&self) -> Vec<String> {
        let state = self.state.read().expect("graph lock poisoned");
        state.manifests.iter().map(|m| m.uri.clone()).collect()
    }

    /// Content type previously resolved for a mounted manifest.
    pub fn content_type_of(&self, uri: &str) -> Option<String> {
        let state = self.state.read().expect("graph lock poisoned");
        state
            .manifests
            .iter()
            .find(|m| m.uri == uri)
            .map(|m| m.content_type.clone())
    }
}

impl std::fmt::Debug for ManifestGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestGraph")
            .field("status", &self.init_status())
            .field("mounted", &self.mounted_uris())
            .finish()
    }
}
