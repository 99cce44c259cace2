//! Cross-Thread Scheduling
//!
//! The [`UiScheduler`] moves logic-side work onto the native UI thread with
//! one loop handoff per tick, brackets view-tree batches for the host, and
//! gates early work behind the first completed flush.

mod executor;
mod ui;

pub use executor::TaskExecutor;
pub use ui::{FlushState, UiScheduler};
