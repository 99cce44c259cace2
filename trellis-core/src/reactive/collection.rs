//! Observable Collections
//!
//! Observable lists and sets wrap their mutating operations into
//! operation-log entries so a renderer can emit minimal native patches
//! instead of re-sending whole collections.
//!
//! # Operation Logs
//!
//! Every structural mutation appends a [`CollectionOp`] to an internal log.
//! The log accumulates between two collection-pass boundaries and is
//! drained wholesale with [`ObservableList::take_ops`]; it never survives a
//! pass. Net index/count deltas always match the mutations in call order.
//!
//! # Multicast Handlers
//!
//! One collection may back several independent reactive owners (two pages
//! rendering the same shared list, for example). Change handlers are
//! therefore a plain multicast subscriber list, invoked in registration
//! order. Handlers are added and removed independently by [`HandlerId`];
//! removing one never reshuffles the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

/// The kind of a collection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Remove,
}

/// One entry in a collection's operation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionOp {
    pub kind: OpKind,
    pub index: usize,
    pub count: usize,
}

impl CollectionOp {
    pub fn add(index: usize, count: usize) -> Self {
        Self {
            kind: OpKind::Add,
            index,
            count,
        }
    }

    pub fn remove(index: usize, count: usize) -> Self {
        Self {
            kind: OpKind::Remove,
            index,
            count,
        }
    }
}

/// Identifies one registered change handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type ChangeHandler = Arc<dyn Fn(&CollectionOp) + Send + Sync>;

/// The multicast handler set shared by list and set.
struct Handlers {
    entries: RwLock<Vec<(HandlerId, ChangeHandler)>>,
}

impl Handlers {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn add<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&CollectionOp) + Send + Sync + 'static,
    {
        let id = HandlerId::next();
        self.entries.write().push((id, Arc::new(handler)));
        id
    }

    fn remove(&self, id: HandlerId) {
        self.entries.write().retain(|(h, _)| *h != id);
    }

    /// Invoke every handler for `op`.
    ///
    /// Handlers run on a snapshot taken outside the lock, so a handler may
    /// add or remove handlers (including itself) mid-notify. Handlers added
    /// during a notification first fire for the next mutation.
    fn notify(&self, op: &CollectionOp) {
        let snapshot: Vec<ChangeHandler> = {
            let entries = self.entries.read();
            entries.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in snapshot {
            handler(op);
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// An observable, order-preserving list.
///
/// Mutations are logged as add/remove operations and fanned out to every
/// registered change handler.
pub struct ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    items: Arc<RwLock<Vec<T>>>,
    ops: Arc<Mutex<SmallVec<[CollectionOp; 8]>>>,
    handlers: Arc<Handlers>,
}

impl<T> ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            ops: Arc::new(Mutex::new(SmallVec::new())),
            handlers: Arc::new(Handlers::new()),
        }
    }

    /// Register a change handler. Handlers fire once per mutation, in
    /// registration order.
    pub fn add_change_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&CollectionOp) + Send + Sync + 'static,
    {
        self.handlers.add(handler)
    }

    /// Remove a previously registered handler.
    pub fn remove_change_handler(&self, id: HandlerId) {
        self.handlers.remove(id);
    }

    /// Number of registered change handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn record(&self, op: CollectionOp) {
        self.ops.lock().push(op);
        self.handlers.notify(&op);
    }

    /// Append a value at the end.
    pub fn push(&self, value: T) {
        let index = {
            let mut items = self.items.write();
            items.push(value);
            items.len() - 1
        };
        self.record(CollectionOp::add(index, 1));
    }

    /// Insert a value at `index`.
    pub fn insert(&self, index: usize, value: T) {
        self.items.write().insert(index, value);
        self.record(CollectionOp::add(index, 1));
    }

    /// Remove and return the value at `index`, if present.
    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.write();
            if index < items.len() {
                Some(items.remove(index))
            } else {
                None
            }
        };
        if removed.is_some() {
            self.record(CollectionOp::remove(index, 1));
        }
        removed
    }

    /// Replace the value at `index`. Logged as a remove followed by an add
    /// at the same index so patch consumers stay index-accurate.
    pub fn set(&self, index: usize, value: T) -> Option<T> {
        let previous = {
            let mut items = self.items.write();
            if index < items.len() {
                Some(std::mem::replace(&mut items[index], value))
            } else {
                None
            }
        };
        if previous.is_some() {
            self.record(CollectionOp::remove(index, 1));
            self.record(CollectionOp::add(index, 1));
        }
        previous
    }

    /// Append every value from `values`.
    pub fn extend_from(&self, values: impl IntoIterator<Item = T>) {
        let (index, count) = {
            let mut items = self.items.write();
            let start = items.len();
            items.extend(values);
            (start, items.len() - start)
        };
        if count > 0 {
            self.record(CollectionOp::add(index, count));
        }
    }

    /// Remove every element. Logged as one remove covering the whole range.
    pub fn clear(&self) {
        let count = {
            let mut items = self.items.write();
            let n = items.len();
            items.clear();
            n
        };
        if count > 0 {
            self.record(CollectionOp::remove(0, count));
        }
    }

    /// Remove every element equal to `value` (removeAll semantics).
    pub fn remove_all(&self, value: &T)
    where
        T: PartialEq,
    {
        // Collect indices first so the log reflects positions as seen by
        // the consumer applying ops in order.
        loop {
            let found = { self.items.read().iter().position(|v| v == value) };
            match found {
                Some(index) => {
                    self.items.write().remove(index);
                    self.record(CollectionOp::remove(index, 1));
                }
                None => break,
            }
        }
    }

    /// Drain the accumulated operation log.
    ///
    /// Called at a collection-pass boundary; the log starts fresh afterward.
    pub fn take_ops(&self) -> Vec<CollectionOp> {
        std::mem::take(&mut *self.ops.lock()).into_vec()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Snapshot the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }
}

impl<T> Default for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            ops: Arc::clone(&self.ops),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

/// An observable set with the same op-log and multicast semantics as
/// [`ObservableList`]. Indices in the log refer to insertion order.
pub struct ObservableSet<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: ObservableList<T>,
}

impl<T> ObservableSet<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: ObservableList::new(),
        }
    }

    pub fn add_change_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&CollectionOp) + Send + Sync + 'static,
    {
        self.inner.add_change_handler(handler)
    }

    pub fn remove_change_handler(&self, id: HandlerId) {
        self.inner.remove_change_handler(id);
    }

    /// Insert a value. Returns false (and logs nothing) if already present.
    pub fn insert(&self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.inner.push(value);
        true
    }

    /// Remove a value. Returns false if it was not present.
    pub fn remove(&self, value: &T) -> bool {
        let found = { self.inner.items.read().iter().position(|v| v == value) };
        match found {
            Some(index) => {
                self.inner.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.inner.items.read().iter().any(|v| v == value)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn take_ops(&self) -> Vec<CollectionOp> {
        self.inner.take_ops()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Default for ObservableSet<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ObservableSet<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
