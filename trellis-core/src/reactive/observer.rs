//! Reactive Observer
//!
//! The observer is the per-pager coordinator that connects observable
//! properties to watchers. It owns the dependency graph and schedules
//! minimal recomputation when properties change.
//!
//! # How It Works
//!
//! 1. A watcher (typically a render function) is registered with the
//!    observer.
//!
//! 2. A collection pass runs the watcher inside a [`WatchContext`]; every
//!    property read during the pass is recorded. At the end of the pass the
//!    watcher's dependency set is replaced wholesale — dependency sets are
//!    never additive across passes, so stale edges from earlier passes drop
//!    out automatically.
//!
//! 3. When a property changes, exactly the watchers whose *current* set
//!    contains the key are marked dirty. Dirty marking dedups by watcher
//!    identity, so any number of same-tick mutations reaching one watcher
//!    coalesce into a single recompute.
//!
//! 4. The first dirty watcher of a tick schedules one drain through the
//!    pager's task manager. The drain recomputes each dirty watcher once,
//!    re-collecting its dependencies.
//!
//! # Thread Safety
//!
//! The observer lives on the logic thread by construction. Locks exist so
//! clones can ride inside scheduled tasks, not to support concurrent
//! mutation of the graph.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::context::WatchContext;
use super::property::PropertyKey;
use crate::task::TaskManager;

/// Unique identifier for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

type WatcherFn = Arc<dyn Fn() + Send + Sync>;

/// The per-pager reactive observer.
///
/// Clones share state; a clone captured into a task keeps the same graph.
pub struct Observer {
    inner: Arc<ObserverInner>,
}

struct ObserverInner {
    /// (owner, name) -> watchers currently depending on it. IndexSet keeps
    /// notification order deterministic (registration order within a key).
    deps: RwLock<HashMap<PropertyKey, IndexSet<WatcherId>>>,

    /// Registered watcher bodies.
    watchers: RwLock<HashMap<WatcherId, WatcherFn>>,

    /// Watchers marked dirty in the current tick, deduped by identity.
    dirty: Mutex<IndexSet<WatcherId>>,

    /// Whether a drain is already scheduled for this tick.
    drain_scheduled: AtomicBool,

    /// Total collection passes run. Diagnostic only.
    recomputes: AtomicUsize,

    destroyed: AtomicBool,

    /// The owning pager's task manager, used to coalesce recomputes onto
    /// the next tick.
    tasks: Arc<TaskManager>,
}

impl Observer {
    pub fn new(tasks: Arc<TaskManager>) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                deps: RwLock::new(HashMap::new()),
                watchers: RwLock::new(HashMap::new()),
                dirty: Mutex::new(IndexSet::new()),
                drain_scheduled: AtomicBool::new(false),
                recomputes: AtomicUsize::new(0),
                destroyed: AtomicBool::new(false),
                tasks,
            }),
        }
    }

    /// Register a watcher without running it. Pair with [`Observer::collect`]
    /// for the initial pass.
    pub fn add_watcher<F>(&self, body: F) -> WatcherId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = WatcherId::new();
        self.inner.watchers.write().insert(id, Arc::new(body));
        id
    }

    /// Register a watcher and run its initial collection pass immediately.
    pub fn watch<F>(&self, body: F) -> WatcherId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.add_watcher(body);
        self.collect(id);
        id
    }

    /// Unregister a watcher and drop all of its dependency edges.
    pub fn remove_watcher(&self, id: WatcherId) {
        self.inner.watchers.write().remove(&id);
        self.inner.dirty.lock().shift_remove(&id);

        let mut deps = self.inner.deps.write();
        for dependents in deps.values_mut() {
            dependents.shift_remove(&id);
        }
        deps.retain(|_, dependents| !dependents.is_empty());
    }

    /// Run a collection pass for the given watcher.
    ///
    /// The watcher's body executes inside a watch context; afterwards its
    /// dependency set is replaced wholesale with the keys read during the
    /// pass.
    pub fn collect(&self, id: WatcherId) {
        self.inner.run_pass(id);
    }

    /// Notify the observer that the property behind `key` changed.
    ///
    /// Marks every current dependent dirty and, for the first dirty watcher
    /// of the tick, schedules exactly one recompute drain on the next tick.
    pub fn notify_change(&self, key: &PropertyKey) {
        let inner = &self.inner;
        if inner.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let dependents: Vec<WatcherId> = {
            let deps = inner.deps.read();
            match deps.get(key) {
                Some(set) => set.iter().copied().collect(),
                None => return,
            }
        };

        if dependents.is_empty() {
            return;
        }

        {
            let mut dirty = inner.dirty.lock();
            for id in dependents {
                dirty.insert(id);
            }
        }

        if inner
            .drain_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            trace!(key = key.name(), "scheduling recompute drain");
            let drain_target = Arc::clone(inner);
            inner.tasks.next_tick(Box::new(move || {
                drain_target.drain();
            }));
        }
    }

    /// Tear the observer down: edges, watchers and the dirty set are all
    /// cleared. Scheduled drains become no-ops.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.deps.write().clear();
        self.inner.watchers.write().clear();
        self.inner.dirty.lock().clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Number of watchers currently marked dirty.
    pub fn pending_dirty(&self) -> usize {
        self.inner.dirty.lock().len()
    }

    /// Total collection passes run so far.
    pub fn recompute_count(&self) -> usize {
        self.inner.recomputes.load(Ordering::SeqCst)
    }

    /// Number of watchers currently depending on `key`.
    pub fn dependent_count(&self, key: &PropertyKey) -> usize {
        self.inner
            .deps
            .read()
            .get(key)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.read().len()
    }
}

impl Clone for Observer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("watchers", &self.watcher_count())
            .field("pending_dirty", &self.pending_dirty())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ObserverInner {
    /// Drain the dirty set, recomputing each watcher once.
    fn drain(self: &Arc<Self>) {
        // Reset the flag before snapshotting so a notification arriving
        // mid-drain schedules a fresh drain instead of being lost.
        self.drain_scheduled.store(false, Ordering::SeqCst);

        let batch: IndexSet<WatcherId> = std::mem::take(&mut *self.dirty.lock());
        for id in batch {
            self.run_pass(id);
        }
    }

    fn run_pass(self: &Arc<Self>, id: WatcherId) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let body = match self.watchers.read().get(&id) {
            Some(body) => Arc::clone(body),
            None => return,
        };

        let collected = {
            let _ctx = WatchContext::enter(id);
            body();
            WatchContext::collected()
        };

        self.replace_dependencies(id, collected);
        self.recomputes.fetch_add(1, Ordering::SeqCst);
    }

    /// Replace the watcher's dependency set wholesale with the keys read
    /// during the pass that just finished.
    fn replace_dependencies(&self, id: WatcherId, collected: Vec<PropertyKey>) {
        let mut deps = self.deps.write();

        for dependents in deps.values_mut() {
            dependents.shift_remove(&id);
        }
        deps.retain(|_, dependents| !dependents.is_empty());

        for key in collected {
            deps.entry(key).or_default().insert(id);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
