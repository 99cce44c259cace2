//! Host Collaborators
//!
//! The core owns no platform resources. Everything that touches a real run
//! loop, a native view, or a platform module is expressed as a trait the
//! embedding host implements:
//!
//! - [`TimerHost`]: a pager-scoped delayed-task primitive. The task manager
//!   uses it for its zero-delay next-tick timer.
//! - [`NativeLoop`]: the native UI thread's run loop. The scheduler posts
//!   its flush closures through it.
//! - [`ModuleResolver`] / [`ShadowResolver`]: factories producing native
//!   module and shadow (layout) instances by name.
//! - [`ViewRegistry`]: maps view tags to opaque native view handles.
//! - [`RenderDelegate`]: applies view-tree operations. Concrete widget
//!   implementations live entirely on the host side.
//! - [`ViewTreeListener`] / [`ExceptionListener`] / [`LifecycleMonitor`]:
//!   observation hooks for layout bracketing, render exceptions, and page
//!   lifecycle stages.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{BridgeMethod, Value};
use crate::error::RenderError;
use crate::pager::{LifecycleStage, PagerId};

/// A unit of work handed to a host primitive. Runs at most once.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A pager-scoped delayed-task primitive.
///
/// The host decides what "the timer thread" means; the core only requires
/// that the task eventually runs and that a zero delay means "as soon as
/// the current tick completes".
pub trait TimerHost: Send + Sync {
    fn post_delayed(&self, delay: Duration, task: Task);
}

/// A trivial [`TimerHost`] that runs tasks inline on the posting thread.
///
/// Useful for single-threaded hosts and deterministic tests. Note that with
/// an inline timer the "next tick" collapses into the current one, so
/// same-tick coalescing degenerates to immediate execution.
pub struct InlineTimer;

impl TimerHost for InlineTimer {
    fn post_delayed(&self, _delay: Duration, task: Task) {
        task();
    }
}

/// The native UI thread's run loop.
pub trait NativeLoop: Send + Sync {
    /// Post a task to run on the native thread.
    fn post(&self, task: Task);

    /// Post a task to run on the native thread after a delay.
    fn post_delayed(&self, delay: Duration, task: Task);

    /// Whether the calling thread *is* the native thread. The scheduler uses
    /// this to run synchronous flushes inline instead of deadlocking on a
    /// cross-thread wait.
    fn is_native_thread(&self) -> bool;
}

/// A native module instance, resolved lazily by name and owned by a pager.
pub trait ModuleInstance: Send + Sync {
    fn name(&self) -> &str;

    /// Invoke a module method. Asynchronous results are delivered later via
    /// the callback token the bridge registered for the call.
    fn call(&self, method: &str, args: &[Value]) -> Value;

    /// Called once when the owning pager is destroyed.
    fn destroy(&self) {}
}

/// A shadow (layout) instance, resolved by name and routed by view ref.
pub trait ShadowInstance: Send + Sync {
    fn call(&self, method: &str, args: &[Value]) -> Value;

    /// Notification that a layout pass for the owning pager finished.
    fn on_layout(&self) {}

    fn destroy(&self) {}
}

/// Resolves module names to live module instances.
pub trait ModuleResolver: Send + Sync {
    fn create_module(&self, pager: PagerId, name: &str) -> Option<Arc<dyn ModuleInstance>>;
}

/// Resolves shadow names to live shadow instances.
pub trait ShadowResolver: Send + Sync {
    fn create_shadow(&self, pager: PagerId, name: &str) -> Option<Arc<dyn ShadowInstance>>;
}

/// An opaque handle to a native view. The core never looks inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeViewRef(pub u64);

/// Maps view tags to native view handles.
pub trait ViewRegistry: Send + Sync {
    fn view_for_tag(&self, pager: PagerId, tag: i32) -> Option<NativeViewRef>;
}

/// Applies view-tree operations on the native side.
///
/// The bridge forwards every view-tree [`BridgeMethod`] here; module and
/// shadow calls are dispatched through the pager's instance tables instead.
pub trait RenderDelegate: Send + Sync {
    fn apply(&self, pager: PagerId, method: BridgeMethod, args: &[Value]) -> Value;
}

/// Brackets view-tree-update batches, so a host can bound a layout pass.
pub trait ViewTreeListener: Send + Sync {
    fn on_update_enqueued(&self);
    fn on_update_finished(&self);
}

/// Receives render exceptions instead of letting them unwind the run loop.
pub trait ExceptionListener: Send + Sync {
    fn on_render_exception(&self, error: RenderError);
}

/// Observes per-page lifecycle stages as the host reports them.
pub trait LifecycleMonitor: Send + Sync {
    fn on_stage(&self, pager: PagerId, stage: LifecycleStage);
}

/// The full set of host bindings the runtime registry needs.
pub struct HostBindings {
    pub timer: Arc<dyn TimerHost>,
    pub modules: Arc<dyn ModuleResolver>,
    pub shadows: Arc<dyn ShadowResolver>,
    pub views: Arc<dyn ViewRegistry>,
    pub renderer: Arc<dyn RenderDelegate>,
}
