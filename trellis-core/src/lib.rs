//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis declarative UI
//! framework. It implements:
//!
//! - Fine-grained reactive properties and observable collections
//! - A per-page observer that coalesces same-tick mutations
//! - A cross-thread UI scheduler with one loop handoff per tick
//! - The logic/native bridge: tagged values, sync/async calls, callbacks
//! - Page lifecycle, the pager registry, and the host trait surface
//!
//! The crate is host-agnostic: everything that touches a real run loop,
//! view, or platform module is a trait in [`host`] that the embedding
//! application implements.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Properties, observable collections, and dependency tracking
//! - `task`: The per-pager microtask queue
//! - `scheduler`: Batched handoff onto the native UI thread
//! - `bridge`: Values, methods, and the call channel
//! - `pager`: Page instances, lifecycle, and the runtime registry
//! - `host`: Traits the embedding host implements
//! - `error`: Creation errors and render exceptions
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::bridge::Value;
//! use trellis_core::host::HostBindings;
//! use trellis_core::pager::{CoreRuntime, PagerId};
//!
//! let runtime = CoreRuntime::new(bindings);
//!
//! runtime.register_page("home", Box::new(|pager, init| {
//!     let count = Property::new(pager.observer(), owner, "count", 0i64);
//!     pager.observer().watch(move || {
//!         let _ = count.get(); // re-runs whenever count changes
//!     });
//! }));
//!
//! let pager = runtime.create_pager(PagerId::from(1), "home", &Value::Null)?;
//! ```

pub mod bridge;
pub mod error;
pub mod host;
pub mod pager;
pub mod reactive;
pub mod scheduler;
pub mod task;

pub use bridge::{BridgeChannel, BridgeMethod, CallId, CallState, CallbackRef, Value};
pub use error::{CoreError, RenderError, RenderReason};
pub use pager::{CoreRuntime, LifecycleStage, Pager, PagerId, PagerState};
pub use reactive::{ObservableList, ObservableSet, Observer, Property};
pub use scheduler::UiScheduler;
pub use task::TaskManager;
