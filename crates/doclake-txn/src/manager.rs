use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doclake_content::ContentProviderRegistry;
use doclake_graph::{ManifestGraph, ReloadPattern};
use doclake_protocol::{
    CommitAction, ProtocolError, ProtocolMethod, ProtocolRegistry, RequestConfig,
};
use doclake_types::{DataLakeChange, LakeEvent, TransactionStatus};

use crate::error::{Result, TxnError};
use crate::mutation::{FileMutation, FileMutationKind};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct TxnState {
    uid: Uuid,
    status: TransactionStatus,
    mutations: Vec<FileMutation>,
}

/// Fallback when a file is not mounted and no pattern matched it.
fn content_type_by_extension(uri: &str) -> Option<String> {
    match uri.rsplit('.').next()? {
        "json" => Some("application/json".to_string()),
        "toml" => Some("application/toml".to_string()),
        _ => None,
    }
}

/// The singleton transaction slot of a data lake.
///
/// All mutation flows through here: `push_data` converts lake changes to
/// versioned per-file puts, `commit` writes each touched file's final
/// content through its protocol driver, `rollback` discards everything.
/// The state lock is never held across an await point.
pub struct TransactionManager {
    graph: Arc<ManifestGraph>,
    protocols: Arc<ProtocolRegistry>,
    providers: Arc<ContentProviderRegistry>,
    current: RwLock<Option<TxnState>>,
    events: broadcast::Sender<LakeEvent>,
}

impl TransactionManager {
    pub fn new(
        graph: Arc<ManifestGraph>,
        protocols: Arc<ProtocolRegistry>,
        providers: Arc<ContentProviderRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            graph,
            protocols,
            providers,
            current: RwLock::new(None),
            events,
        }
    }

    /// Subscribe to transaction status events.
    pub fn subscribe(&self) -> broadcast::Receiver<LakeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, status: TransactionStatus) {
        let _ = self.events.send(LakeEvent::Transaction { status });
    }

    /// Status of the current transaction; `Closed` when none is open.
    pub fn status(&self) -> TransactionStatus {
        self.current
            .read()
            .expect("txn lock poisoned")
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(TransactionStatus::Closed)
    }

    /// Identifier of the current transaction, if one is open.
    pub fn current_uid(&self) -> Option<Uuid> {
        self.current
            .read()
            .expect("txn lock poisoned")
            .as_ref()
            .map(|s| s.uid)
    }

    /// Open a transaction. Fails while another one is still open.
    pub fn begin(&self) -> Result<Uuid> {
        let mut slot = self.current.write().expect("txn lock poisoned");
        if let Some(state) = slot.as_ref() {
            if !state.status.is_terminal() {
                return Err(TxnError::Conflict);
            }
        }
        let uid = Uuid::now_v7();
        *slot = Some(TxnState {
            uid,
            status: TransactionStatus::Open,
            mutations: Vec::new(),
        });
        drop(slot);
        info!(txn = %uid, "transaction opened");
        self.emit(TransactionStatus::Open);
        Ok(uid)
    }

    /// Discard all pending mutations and close the transaction.
    pub fn rollback(&self) -> Result<()> {
        {
            let mut slot = self.current.write().expect("txn lock poisoned");
            match slot.as_mut() {
                Some(state) if state.status == TransactionStatus::Open => {
                    state.status = TransactionStatus::Canceling;
                }
                _ => return Err(TxnError::NoOpenTransaction),
            }
        }
        self.emit(TransactionStatus::Canceling);
        *self.current.write().expect("txn lock poisoned") = None;
        info!("transaction rolled back");
        self.emit(TransactionStatus::Closed);
        Ok(())
    }

    /// Latest pending put content per URI, from the open transaction.
    fn pending_content(&self) -> Result<HashMap<String, String>> {
        let slot = self.current.read().expect("txn lock poisoned");
        let state = slot.as_ref().ok_or(TxnError::NoOpenTransaction)?;
        if state.status != TransactionStatus::Open {
            return Err(TxnError::NoOpenTransaction);
        }
        let mut latest = HashMap::new();
        for mutation in &state.mutations {
            if let Some(content) = mutation.content() {
                latest.insert(mutation.uri.clone(), content.to_string());
            }
        }
        Ok(latest)
    }

    fn content_type_for(&self, uri: &str) -> Result<String> {
        self.graph
            .content_type_of(uri)
            .or_else(|| content_type_by_extension(uri))
            .ok_or_else(|| TxnError::UnknownContentType(uri.to_string()))
    }

    /// Current content of `uri`: the latest pending version, the stored
    /// file, or an empty document for files the commit will create.
    async fn base_content(
        &self,
        uri: &str,
        pending: &HashMap<String, String>,
        content_type: &str,
    ) -> Result<String> {
        if let Some(content) = pending.get(uri) {
            return Ok(content.clone());
        }
        let driver = self.protocols.driver_for_uri(uri)?;
        match driver.request(RequestConfig::get(uri)).await {
            Ok(response) => Ok(response.text()),
            Err(ProtocolError::ResourceMissing(_)) => {
                Ok(self.providers.get(content_type)?.to_content(&json!({}))?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage lake changes as versioned file mutations.
    ///
    /// Every change needs a target file: either pinned on the change or
    /// inferred from the owning manifest of its path. The whole batch is
    /// validated before anything is staged. Returns the accepted changes
    /// with their targets filled in.
    pub async fn push_data(&self, changes: Vec<DataLakeChange>) -> Result<Vec<DataLakeChange>> {
        let pending = self.pending_content()?;

        // Resolve targets up front; reject the batch on the first gap.
        let mut accepted: Vec<DataLakeChange> = Vec::with_capacity(changes.len());
        for mut change in changes {
            if change.target_file.is_none() {
                let owner = self
                    .graph
                    .owner_for_path(&change.path)
                    .ok_or_else(|| TxnError::UnmappablePath(change.path.to_string()))?;
                change.target_file = Some(owner);
            }
            accepted.push(change);
        }

        // Group per file, preserving first-appearance order.
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<DataLakeChange>> = HashMap::new();
        for change in &accepted {
            let uri = change.target_file.clone().unwrap_or_default();
            if !grouped.contains_key(&uri) {
                order.push(uri.clone());
            }
            grouped.entry(uri).or_default().push(change.clone());
        }

        let mut staged = Vec::with_capacity(order.len());
        for uri in order {
            let file_changes = &grouped[&uri];
            let content_type = self.content_type_for(&uri)?;
            let provider = self.providers.get(&content_type)?;
            let base = self.base_content(&uri, &pending, &content_type).await?;
            let content = provider.mutation(&base, file_changes)?;
            staged.push(FileMutation::put(uri, content));
        }

        let mut slot = self.current.write().expect("txn lock poisoned");
        match slot.as_mut() {
            Some(state) if state.status == TransactionStatus::Open => {
                debug!(count = staged.len(), "staged file mutations");
                state.mutations.extend(staged);
                Ok(accepted)
            }
            _ => Err(TxnError::NoOpenTransaction),
        }
    }

    /// Write every touched file through its protocol driver.
    ///
    /// Files on one scheme commit as a single `COMMIT` batch when the
    /// driver offers the method, falling back to sequential `PUT`s
    /// otherwise. Any failure puts the transaction back to `Open` with
    /// its mutations intact. On success the transaction closes and the
    /// affected manifests are re-fetched. Returns the affected URIs.
    pub async fn commit(&self, comment: Option<String>) -> Result<Vec<String>> {
        let finals = {
            let mut slot = self.current.write().expect("txn lock poisoned");
            let state = match slot.as_mut() {
                Some(state) if state.status == TransactionStatus::Open => state,
                _ => return Err(TxnError::NoOpenTransaction),
            };
            state.status = TransactionStatus::Committing;
            final_mutations(&state.mutations)
        };
        self.emit(TransactionStatus::Committing);

        if let Err(e) = self.apply(&finals, comment).await {
            let mut slot = self.current.write().expect("txn lock poisoned");
            if let Some(state) = slot.as_mut() {
                state.status = TransactionStatus::Open;
            }
            drop(slot);
            warn!(error = %e, "commit failed, transaction stays open");
            self.emit(TransactionStatus::Open);
            return Err(e);
        }

        *self.current.write().expect("txn lock poisoned") = None;
        self.emit(TransactionStatus::Closed);

        let affected: Vec<String> = finals.iter().map(|(uri, _)| uri.clone()).collect();
        info!(count = affected.len(), "transaction committed");
        if let Err(e) = self
            .graph
            .reload(Some(ReloadPattern::Many(affected.clone())))
            .await
        {
            // The writes are durable; a reload hiccup must not unwind them.
            warn!(error = %e, "post-commit reload failed");
        }
        Ok(affected)
    }

    async fn apply(
        &self,
        finals: &[(String, FileMutationKind)],
        comment: Option<String>,
    ) -> Result<()> {
        // Group per scheme so batch-capable backends commit atomically.
        let mut order: Vec<String> = Vec::new();
        let mut by_scheme: HashMap<String, Vec<&(String, FileMutationKind)>> = HashMap::new();
        for entry in finals {
            let scheme = ProtocolRegistry::scheme_of(&entry.0)?.to_string();
            if !by_scheme.contains_key(&scheme) {
                order.push(scheme.clone());
            }
            by_scheme.entry(scheme).or_default().push(entry);
        }

        for scheme in order {
            let entries = &by_scheme[&scheme];
            let driver = self.protocols.get(&scheme)?;
            let first_uri = &entries[0].0;
            let methods = driver.available_methods_for(first_uri).await?;

            if methods.contains(&ProtocolMethod::Commit) {
                let actions = entries
                    .iter()
                    .map(|(uri, kind)| match kind {
                        FileMutationKind::Put { content } => CommitAction::Post {
                            uri: uri.clone(),
                            content: content.clone(),
                        },
                        FileMutationKind::Delete => CommitAction::Delete { uri: uri.clone() },
                        FileMutationKind::Move { to } => CommitAction::Rename {
                            from: uri.clone(),
                            to: to.clone(),
                        },
                    })
                    .collect();
                driver
                    .request(RequestConfig::commit(first_uri.clone(), actions, comment.clone()))
                    .await?;
                continue;
            }

            for (uri, kind) in entries.iter() {
                match kind {
                    FileMutationKind::Put { content } => {
                        driver
                            .request(RequestConfig::put(uri.clone(), content.clone()))
                            .await?;
                    }
                    FileMutationKind::Delete => {
                        driver
                            .request(RequestConfig::new(ProtocolMethod::Delete, uri.clone()))
                            .await?;
                    }
                    FileMutationKind::Move { .. } => {
                        return Err(ProtocolError::MethodUnavailable {
                            method: ProtocolMethod::Commit.to_string(),
                            uri: uri.clone(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Pending versions for one file, oldest first.
    pub fn file_versions(&self, uri: &str) -> Vec<FileMutation> {
        self.current
            .read()
            .expect("txn lock poisoned")
            .as_ref()
            .map(|state| {
                state
                    .mutations
                    .iter()
                    .filter(|m| m.uri == uri)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look up one pending version by its identifier.
    pub fn file_version(&self, uid: Uuid) -> Option<FileMutation> {
        self.current
            .read()
            .expect("txn lock poisoned")
            .as_ref()
            .and_then(|state| state.mutations.iter().find(|m| m.uid == uid).cloned())
    }

    /// Drop pending versions by identifier. Returns how many were removed.
    pub fn delete_file_versions(&self, uids: &[Uuid]) -> usize {
        let mut slot = self.current.write().expect("txn lock poisoned");
        let Some(state) = slot.as_mut() else {
            return 0;
        };
        let before = state.mutations.len();
        state.mutations.retain(|m| !uids.contains(&m.uid));
        before - state.mutations.len()
    }
}

/// Collapse the version history into one final mutation per file,
/// preserving first-appearance order.
fn final_mutations(mutations: &[FileMutation]) -> Vec<(String, FileMutationKind)> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, FileMutationKind> = HashMap::new();
    for mutation in mutations {
        if !latest.contains_key(&mutation.uri) {
            order.push(mutation.uri.clone());
        }
        latest.insert(mutation.uri.clone(), mutation.kind.clone());
    }
    order
        .into_iter()
        .map(|uri| {
            let kind = latest.remove(&uri).unwrap_or(FileMutationKind::Delete);
            (uri, kind)
        })
        .collect()
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("status", &self.status())
            .finish()
    }
}
