use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FollowError, Result};
use crate::scheduler::Scheduler;

/// How long a URI must stay quiet before its handlers fire.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Handler invoked with the URI that changed.
type FollowCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Token identifying one (URI, handler) registration.
///
/// Closures have no identity of their own, so unfollowing goes through
/// the token handed out at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FollowHandle(Uuid);

struct Registry {
    // uri -> registrations, in registration order
    entries: HashMap<String, Vec<(FollowHandle, FollowCallback)>>,
}

/// Debounced change dispatch for followed resources.
///
/// `notify_changed` does not fire handlers directly; it (re)schedules a
/// delayed dispatch for the URI, so a burst of notifications within the
/// debounce window collapses into one firing. Handlers registered at
/// dispatch time are the ones that run: unfollowing during the window
/// suppresses the handler even with a timer pending.
#[derive(Clone)]
pub struct FollowService {
    scheduler: Arc<Scheduler>,
    registry: Arc<RwLock<Registry>>,
}

impl FollowService {
    pub fn new() -> Self {
        Self {
            scheduler: Arc::new(Scheduler::new()),
            registry: Arc::new(RwLock::new(Registry {
                entries: HashMap::new(),
            })),
        }
    }

    /// Register a handler for changes to `uri`.
    pub fn follow(&self, uri: impl Into<String>, handler: FollowCallback) -> FollowHandle {
        let uri = uri.into();
        let handle = FollowHandle(Uuid::now_v7());
        let mut registry = self.registry.write().expect("follow lock poisoned");
        registry.entries.entry(uri).or_default().push((handle, handler));
        handle
    }

    /// Remove one registration. Returns `false` for an unknown handle.
    pub fn unfollow(&self, handle: FollowHandle) -> bool {
        let mut registry = self.registry.write().expect("follow lock poisoned");
        let mut removed = false;
        registry.entries.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(h, _)| *h != handle);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    /// Report a change to `uri`, debounced by [`DEBOUNCE_WINDOW`].
    pub fn notify_changed(&self, uri: &str) {
        let registry = self.registry.clone();
        let uri_owned = uri.to_string();
        self.scheduler.schedule(uri, DEBOUNCE_WINDOW, async move {
            let handlers: Vec<FollowCallback> = {
                let registry = registry.read().expect("follow lock poisoned");
                registry
                    .entries
                    .get(&uri_owned)
                    .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
                    .unwrap_or_default()
            };
            debug!(uri = %uri_owned, handlers = handlers.len(), "dispatching change");
            for handler in handlers {
                handler(&uri_owned);
            }
        });
    }

    /// Followed URIs matching a regular expression.
    pub fn containing(&self, pattern: &str) -> Result<Vec<String>> {
        let regex = Regex::new(pattern).map_err(|e| FollowError::BadPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let registry = self.registry.read().expect("follow lock poisoned");
        let mut uris: Vec<String> = registry
            .entries
            .keys()
            .filter(|uri| regex.is_match(uri))
            .cloned()
            .collect();
        uris.sort();
        Ok(uris)
    }

    /// Every followed URI.
    pub fn tracked(&self) -> Vec<String> {
        let registry = self.registry.read().expect("follow lock poisoned");
        let mut uris: Vec<String> = registry.entries.keys().cloned().collect();
        uris.sort();
        uris
    }
}

impl Default for FollowService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FollowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowService")
            .field("tracked", &self.tracked())
            .finish()
    }
}
