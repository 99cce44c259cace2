//! Pages and Their Runtime
//!
//! A [`Pager`] is one live page instance; the [`CoreRuntime`] registry
//! creates them from named [`PageFactory`] entries and routes host
//! notifications to them. [`LifecycleTracker`] records the stage timeline
//! the host reports for each page.

mod lifecycle;
#[allow(clippy::module_inception)]
mod pager;
mod registry;

pub use lifecycle::{LifecycleStage, LifecycleTracker};
pub use pager::{CallbackSlot, Pager, PagerId, PagerState};
pub use registry::{CoreRuntime, PageFactory};
