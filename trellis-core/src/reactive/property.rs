//! Observable Property
//!
//! A Property is the fundamental change-detecting state cell. It holds a
//! value on behalf of a logic object and participates in dependency
//! tracking through its owning pager's [`Observer`].
//!
//! # How Properties Work
//!
//! 1. When a property is read during a collection pass, the property's key
//!    is recorded against the currently collecting watcher.
//!
//! 2. When a property's value changes, the observer notifies exactly the
//!    watchers whose *current* dependency set includes the key.
//!
//! 3. Writes are equality-checked: setting a property to the value it
//!    already holds produces no notification at all.
//!
//! # Thread Safety
//!
//! Properties live on the logic thread by construction, but the value is
//! still behind a lock so that clones can be captured into tasks without
//! aliasing hazards.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::WatchContext;
use super::observer::Observer;

/// Unique identifier for a logic object owning one or more properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Generate a new unique owner ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

/// The dependency-edge key: (owner, property name).
///
/// The name is shared via `Arc<str>` so keys are cheap to clone into the
/// watch context and the observer's edge table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    owner: OwnerId,
    name: Arc<str>,
}

impl PropertyKey {
    pub fn new(owner: OwnerId, name: impl Into<Arc<str>>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A change-detecting state cell bound to a pager's observer.
///
/// # Example
///
/// ```rust,ignore
/// let count = Property::new(&observer, owner, "count", 0);
///
/// // Read the value (records a dependency inside a collection pass)
/// let value = count.get();
///
/// // Update the value (notifies dependent watchers)
/// count.set(5);
/// ```
pub struct Property<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// The dependency-edge key for this slot.
    key: PropertyKey,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// The observer of the pager this property belongs to.
    observer: Observer,
}

impl<T> Property<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new property owned by `owner` under the given name.
    pub fn new(observer: &Observer, owner: OwnerId, name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            key: PropertyKey::new(owner, name),
            value: Arc::new(RwLock::new(value)),
            observer: observer.clone(),
        }
    }

    /// Get this property's dependency-edge key.
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// Get the current value.
    ///
    /// If called during a collection pass, the current watcher is recorded
    /// as a dependent of this property.
    pub fn get(&self) -> T {
        if WatchContext::is_active() {
            WatchContext::track(self.key.clone());
        }

        self.value.read().clone()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify dependent watchers.
    ///
    /// Writes are equality-checked: an unchanged value produces no
    /// notification and schedules no recompute.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write();
            if *guard == value {
                return;
            }
            *guard = value;
        }

        self.observer.notify_change(&self.key);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value);
    }
}

impl<T> Clone for Property<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
            observer: self.observer.clone(),
        }
    }
}

impl<T> Debug for Property<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("key", &self.key)
            .field("value", &self.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
