use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Keyed delayed-task scheduler.
///
/// Scheduling under a key that already has a pending task cancels the
/// older one, so only the most recent task per key ever runs. This is
/// the debounce primitive of the follow service.
pub struct Scheduler {
    tasks: Arc<Mutex<HashMap<String, Pending>>>,
    next_generation: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Run `task` after `delay`, replacing any pending task for `key`.
    pub fn schedule<F>(&self, key: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        trace!(key = %key, delay_ms = delay.as_millis() as u64, "scheduling task");
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
            // Drop our own entry, unless a newer task already replaced it.
            let mut tasks = tasks.lock().expect("scheduler lock poisoned");
            if tasks.get(&task_key).is_some_and(|p| p.generation == generation) {
                tasks.remove(&task_key);
            }
        });
        let mut tasks = self.tasks.lock().expect("scheduler lock poisoned");
        if let Some(previous) = tasks.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel the pending task for `key`, if any.
    pub fn cancel(&self, key: &str) {
        let mut tasks = self.tasks.lock().expect("scheduler lock poisoned");
        if let Some(pending) = tasks.remove(key) {
            pending.handle.abort();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let tasks = self.tasks.lock().expect("scheduler lock poisoned");
        for pending in tasks.values() {
            pending.handle.abort();
        }
    }
}
