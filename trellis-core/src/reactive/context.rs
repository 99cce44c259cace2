//! Watch Context
//!
//! The watch context tracks which watcher is currently collecting
//! dependencies. This enables automatic dependency tracking: when an
//! observable property is read, we can record the current watcher as a
//! dependent of that property's key.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently collecting watcher.
//! When a collection pass starts we push the watcher onto the stack; when
//! the pass completes, we pop it. The stack supports nested passes (a
//! watcher whose body triggers another watcher's pass).
//!
//! The context only *gathers* keys. Committing them — replacing the
//! watcher's dependency set wholesale — is the observer's job at the end of
//! the pass.

use std::cell::RefCell;

use super::observer::WatcherId;
use super::property::PropertyKey;

thread_local! {
    static WATCH_STACK: RefCell<Vec<StackEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the watch stack: the collecting watcher plus the property
/// keys read so far during its pass.
struct StackEntry {
    watcher: WatcherId,
    collected: Vec<PropertyKey>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack consistent even if the collection pass panics.
pub struct WatchContext {
    watcher: WatcherId,
}

impl WatchContext {
    /// Begin a collection pass for the given watcher.
    ///
    /// While the returned guard is alive, property reads on this thread are
    /// recorded against the watcher.
    pub fn enter(watcher: WatcherId) -> Self {
        WATCH_STACK.with(|stack| {
            stack.borrow_mut().push(StackEntry {
                watcher,
                collected: Vec::new(),
            });
        });

        Self { watcher }
    }

    /// Check if a collection pass is active on this thread.
    pub fn is_active() -> bool {
        WATCH_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the currently collecting watcher, if any.
    pub fn current_watcher() -> Option<WatcherId> {
        WATCH_STACK.with(|stack| stack.borrow().last().map(|entry| entry.watcher))
    }

    /// Record a read of the given property key.
    ///
    /// Called by observable properties from their getters.
    pub fn track(key: PropertyKey) {
        WATCH_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.collected.push(key);
            }
        });
    }

    /// The keys collected so far in the current pass.
    pub fn collected() -> Vec<PropertyKey> {
        WATCH_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.collected.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for WatchContext {
    fn drop(&mut self) {
        WATCH_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Catch mismatched enter/drop pairs early in debug builds.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.watcher, self.watcher,
                    "WatchContext mismatch: expected {:?}, got {:?}",
                    self.watcher, entry.watcher
                );
            }
        });
    }
}
