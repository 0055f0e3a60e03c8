//! Work registry: the set of in-flight work units.
//!
//! Every dispatched action runs as a tokio task. The registry keeps an
//! abort handle for each one, keyed by a [`WorkId`], and learns about
//! terminal tasks through an observer that reports back over a channel the
//! owner drains with [`WorkRegistry::finished`]. Dropping the registry
//! cancels whatever is still in flight.
//!
//! The registry is not `Sync`-shared: one owner (the engine's main domain)
//! drives every insert, visit and removal, so there is no locking here.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error};
use uuid::Uuid;

/// Identity of one work unit. Two dispatches of an identical action get
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered work unit: its key plus a handle to cancel the task.
///
/// Clones share the underlying task, so cancelling any clone cancels the
/// work.
#[derive(Debug, Clone)]
pub struct WorkItem<K> {
    id: WorkId,
    key: K,
    abort: AbortHandle,
    cancelled: Arc<AtomicBool>,
}

impl<K> WorkItem<K> {
    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Request cancellation. Returns `true` only for the call that actually
    /// cancelled; repeated calls and calls on finished work are no-ops.
    pub fn cancel(&self) -> bool {
        if self.abort.is_finished() || self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.abort.abort();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// The set of in-flight work units.
pub struct WorkRegistry<K> {
    items: HashMap<WorkId, WorkItem<K>>,
    finished_tx: mpsc::UnboundedSender<WorkId>,
    finished_rx: mpsc::UnboundedReceiver<WorkId>,
}

impl<K> WorkRegistry<K> {
    pub fn new() -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            items: HashMap::new(),
            finished_tx,
            finished_rx,
        }
    }

    /// Track a spawned task under `id`.
    ///
    /// An observer task awaits the task's terminal state (completed, failed
    /// or cancelled) and reports `id` back through [`finished`](Self::finished).
    /// The observer only holds a weak sender, so it does nothing once the
    /// registry is gone.
    ///
    /// Must be called from within a tokio runtime.
    pub fn store(&mut self, id: WorkId, key: K, task: JoinHandle<()>) -> &WorkItem<K> {
        let abort = task.abort_handle();
        let observer = self.finished_tx.downgrade();

        tokio::spawn(async move {
            match task.await {
                Ok(()) => debug!(work_id = %id, "work finished"),
                Err(e) if e.is_cancelled() => debug!(work_id = %id, "work cancelled"),
                Err(e) => error!(work_id = %id, error = %e, "work panicked"),
            }
            if let Some(tx) = observer.upgrade() {
                let _ = tx.send(id);
            }
        });

        self.items.entry(id).or_insert(WorkItem {
            id,
            key,
            abort,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Wait for the next work unit to reach a terminal state.
    ///
    /// The id is reported but not removed; pass it to [`remove`](Self::remove).
    pub async fn finished(&mut self) -> Option<WorkId> {
        self.finished_rx.recv().await
    }

    /// Forget a work unit. No-op if it is already gone.
    pub fn remove(&mut self, id: WorkId) -> Option<WorkItem<K>> {
        self.items.remove(&id)
    }

    pub fn contains(&self, id: WorkId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cancel every tracked work unit. Entries stay until their observers
    /// report them finished.
    pub fn cancel_all(&self) -> usize {
        self.items.values().filter(|item| item.cancel()).count()
    }
}

impl<K: Clone> WorkRegistry<K> {
    /// Current items, copied out so the caller may freely mutate task state
    /// (or the registry) while walking them.
    pub fn snapshot(&self) -> Vec<WorkItem<K>> {
        self.items.values().cloned().collect()
    }

    /// Visit a snapshot of the current items.
    pub fn for_each(&self, mut visit: impl FnMut(&WorkItem<K>)) {
        for item in self.snapshot() {
            visit(&item);
        }
    }

    /// Cancel every live item whose key matches. Items already cancelled or
    /// finished are skipped without consulting `predicate`. Returns how many
    /// were cancelled by this call.
    pub fn cancel_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut cancelled = 0;
        self.for_each(|item| {
            if item.is_cancelled() || item.is_finished() {
                return;
            }
            if predicate(item.key()) && item.cancel() {
                cancelled += 1;
            }
        });
        cancelled
    }
}

impl<K> Default for WorkRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for WorkRegistry<K> {
    fn drop(&mut self) {
        let cancelled = self.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "registry dropped, in-flight work cancelled");
        }
    }
}
