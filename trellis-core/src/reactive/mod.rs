//! Reactive Primitives
//!
//! This module implements the fine-grained reactive system: observable
//! properties, observable collections, and the per-pager observer that ties
//! them to watchers.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A Property is a change-detecting state cell identified by its owning
//! logic object and a name. Reading it during a collection pass records the
//! current watcher as a dependent; writing it notifies exactly the watchers
//! whose current dependency set contains its key. Writes are
//! equality-checked, so re-assigning an unchanged value is free.
//!
//! ## Collections
//!
//! Observable lists and sets log their structural mutations as add/remove
//! operations so renderers can emit minimal patches, and fan change
//! notifications out to a multicast handler set (one collection may back
//! several reactive owners).
//!
//! ## The Observer
//!
//! Each pager owns one Observer. It maintains the dependency edges, dedups
//! dirty watchers within a tick, and coalesces any number of same-tick
//! mutations into a single recompute scheduled through the pager's task
//! manager.
//!
//! # Implementation Notes
//!
//! Dependency detection uses a thread-local watch context. When a property
//! is read, we check whether a collection pass is active on the current
//! thread and, if so, record the key. At the end of each pass the watcher's
//! dependency set is replaced wholesale; this keeps conditional reads
//! honest (an edge only survives as long as the last pass actually took
//! it). This approach is the same automatic dependency tracking used by
//! SolidJS, Vue 3, and Leptos.

mod collection;
mod context;
mod observer;
mod property;

pub use collection::{CollectionOp, HandlerId, ObservableList, ObservableSet, OpKind};
pub use context::WatchContext;
pub use observer::{Observer, WatcherId};
pub use property::{OwnerId, Property, PropertyKey};
