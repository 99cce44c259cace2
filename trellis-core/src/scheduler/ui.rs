//! UI Task Scheduler
//!
//! Logic-side work that must run on the native UI thread funnels through
//! [`UiScheduler`]. Tasks scheduled within one tick accumulate in a pending
//! list and cross the thread boundary as a single native-loop post, so N
//! schedules cost one handoff instead of N.
//!
//! # How It Works
//!
//! 1. `schedule_task` appends to the pending list. The first append of a
//!    tick wins a compare-and-swap on `flush_posted` and posts exactly one
//!    flush closure to the native loop; later appends ride along.
//! 2. The flush snapshots the pending list, clears the posted flag (so
//!    tasks scheduled *during* the flush earn a fresh post next tick), and
//!    drains the snapshot in FIFO order.
//! 3. Consecutive tasks of the same kind form a batch. View-tree batches
//!    are bracketed with the host's [`ViewTreeListener`]; a panic inside a
//!    batch aborts the rest of that batch only and is reported to the
//!    [`ExceptionListener`] as a flush failure. Later batches still run.
//!
//! # First Paint Gating
//!
//! Work that must not run before the first flush completes goes through
//! `perform_when_view_did_load`: it queues until the first flush that
//! actually ran tasks finishes, then runs, and every later submission runs
//! immediately. A flush of an empty queue does not open the gate.
//!
//! # Thread Safety
//!
//! Cloning shares the scheduler. `schedule_task` is callable from any
//! thread; the flush itself always runs on the native thread (or inline in
//! `flush_sync` when the caller already is the native thread).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use super::executor::TaskExecutor;
use crate::error::RenderError;
use crate::host::{ExceptionListener, NativeLoop, Task, ViewTreeListener};

/// Coarse state of the flush pipeline. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Nothing pending, nothing posted.
    Idle,
    /// Tasks are accumulating but no flush is posted yet.
    Collecting,
    /// A flush closure is posted to the native loop.
    FlushScheduled,
    /// The flush is draining on the native thread.
    Flushing,
}

struct SchedulerInner {
    native: Arc<dyn NativeLoop>,
    pending: Mutex<Vec<TaskExecutor>>,
    state: Mutex<FlushState>,
    flush_posted: AtomicBool,
    view_did_load: AtomicBool,
    gated: Mutex<Vec<Task>>,
    tree_listener: RwLock<Option<Arc<dyn ViewTreeListener>>>,
    exception_listener: RwLock<Option<Arc<dyn ExceptionListener>>>,
    destroyed: AtomicBool,
}

/// Batches logic-side tasks onto the native UI thread.
#[derive(Clone)]
pub struct UiScheduler {
    inner: Arc<SchedulerInner>,
}

impl UiScheduler {
    pub fn new(native: Arc<dyn NativeLoop>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                native,
                pending: Mutex::new(Vec::new()),
                state: Mutex::new(FlushState::Idle),
                flush_posted: AtomicBool::new(false),
                view_did_load: AtomicBool::new(false),
                gated: Mutex::new(Vec::new()),
                tree_listener: RwLock::new(None),
                exception_listener: RwLock::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_view_tree_listener(&self, listener: Arc<dyn ViewTreeListener>) {
        *self.inner.tree_listener.write() = Some(listener);
    }

    pub fn set_exception_listener(&self, listener: Arc<dyn ExceptionListener>) {
        *self.inner.exception_listener.write() = Some(listener);
    }

    /// Schedule a task for the native thread.
    ///
    /// A zero delay joins the current tick's batch. A positive delay is
    /// routed through the native loop's delayed post and joins whichever
    /// batch is forming when it fires.
    pub fn schedule_task(&self, delay: Duration, is_update_view_tree: bool, task: Task) {
        if self.inner.destroyed.load(Ordering::Acquire) {
            debug!("dropping task scheduled after scheduler destroy");
            return;
        }

        if !delay.is_zero() {
            let this = self.clone();
            self.inner.native.post_delayed(
                delay,
                Box::new(move || {
                    this.schedule_task(Duration::ZERO, is_update_view_tree, task);
                }),
            );
            return;
        }

        {
            let mut pending = self.inner.pending.lock();
            pending.push(TaskExecutor::new(is_update_view_tree, task));
            let mut state = self.inner.state.lock();
            if *state == FlushState::Idle {
                *state = FlushState::Collecting;
            }
        }
        self.request_flush();
    }

    /// Run `task` once the first non-empty flush has completed. Runs
    /// inline if it already has; queues otherwise.
    pub fn perform_when_view_did_load(&self, task: Task) {
        if self.inner.view_did_load.load(Ordering::Acquire) {
            task();
            return;
        }

        let mut gated = self.inner.gated.lock();
        // The first flush may have completed between the check and the
        // lock; re-check so the task cannot be stranded.
        if self.inner.view_did_load.load(Ordering::Acquire) {
            drop(gated);
            task();
            return;
        }
        gated.push(task);
    }

    /// Flush pending tasks now if the caller is on the native thread,
    /// otherwise post a flush. Never blocks the calling thread.
    pub fn flush_sync(&self) {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return;
        }

        if self.inner.native.is_native_thread() {
            self.flush();
        } else {
            self.request_flush();
        }
    }

    pub fn state(&self) -> FlushState {
        *self.inner.state.lock()
    }

    pub fn view_did_load(&self) -> bool {
        self.inner.view_did_load.load(Ordering::Acquire)
    }

    /// Tasks waiting for the next flush. Diagnostic only.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Drop everything and refuse further scheduling. Pending and gated
    /// tasks are discarded without running.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.pending.lock().clear();
        self.inner.gated.lock().clear();
        *self.inner.state.lock() = FlushState::Idle;
    }

    /// Post exactly one flush closure per tick.
    fn request_flush(&self) {
        if self
            .inner
            .flush_posted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.inner.state.lock() = FlushState::FlushScheduled;
            let this = self.clone();
            self.inner.native.post(Box::new(move || this.flush()));
        }
    }

    fn flush(&self) {
        if self.inner.destroyed.load(Ordering::Acquire) {
            self.inner.flush_posted.store(false, Ordering::Release);
            return;
        }

        let batch: Vec<TaskExecutor> = std::mem::take(&mut *self.inner.pending.lock());
        // Clear the posted flag before draining: tasks scheduled by the
        // tasks below belong to the next tick and need their own post.
        self.inner.flush_posted.store(false, Ordering::Release);
        *self.inner.state.lock() = FlushState::Flushing;

        let flushed_work = !batch.is_empty();
        let mut iter = batch.into_iter().peekable();
        while let Some(first) = iter.next() {
            let view_tree = first.is_update_view_tree();
            let mut run = vec![first];
            while let Some(next) = iter.next_if(|t| t.is_update_view_tree() == view_tree) {
                run.push(next);
            }
            self.execute_batch(view_tree, run);
        }

        *self.inner.state.lock() = FlushState::Idle;

        // Only a flush that actually ran something counts as first paint;
        // an empty flush_sync must not open the gate.
        if flushed_work
            && self
                .inner
                .view_did_load
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            let gated: Vec<Task> = std::mem::take(&mut *self.inner.gated.lock());
            for task in gated {
                task();
            }
        }
    }

    /// Run one batch. A panic aborts the remainder of this batch, is
    /// reported as a flush failure, and leaves later batches untouched.
    ///
    /// Listeners are cloned out of their slots before they run, so a
    /// listener (or a task) may install a replacement mid-batch without
    /// re-entering the slot lock. The same listener brackets both ends of
    /// a batch even if it was swapped in between.
    fn execute_batch(&self, view_tree: bool, run: Vec<TaskExecutor>) {
        let tree_listener = if view_tree {
            self.inner.tree_listener.read().clone()
        } else {
            None
        };

        if let Some(listener) = &tree_listener {
            listener.on_update_enqueued();
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            for task in run {
                task.execute();
            }
        }));

        if let Some(listener) = &tree_listener {
            listener.on_update_finished();
        }

        if let Err(payload) = outcome {
            let message = panic_message(payload);
            error!(panic = %message, "scheduled batch panicked during flush");
            let exception_listener = self.inner.exception_listener.read().clone();
            if let Some(listener) = exception_listener {
                listener.on_render_exception(RenderError::flush_failure(message));
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// A manual native loop: posted tasks queue until the test pumps them.
    #[derive(Default)]
    struct TestLoop {
        queue: Mutex<Vec<Task>>,
        delayed: Mutex<Vec<(Duration, Task)>>,
        posts: AtomicUsize,
    }

    impl TestLoop {
        fn pump(&self) {
            loop {
                let batch: Vec<Task> = std::mem::take(&mut *self.queue.lock());
                if batch.is_empty() {
                    return;
                }
                for task in batch {
                    task();
                }
            }
        }

        fn fire_delayed(&self) {
            let batch: Vec<(Duration, Task)> = std::mem::take(&mut *self.delayed.lock());
            for (_, task) in batch {
                task();
            }
        }
    }

    impl NativeLoop for TestLoop {
        fn post(&self, task: Task) {
            self.posts.fetch_add(1, Ordering::SeqCst);
            self.queue.lock().push(task);
        }

        fn post_delayed(&self, delay: Duration, task: Task) {
            self.delayed.lock().push((delay, task));
        }

        fn is_native_thread(&self) -> bool {
            true
        }
    }

    fn setup() -> (Arc<TestLoop>, UiScheduler) {
        let native = Arc::new(TestLoop::default());
        let scheduler = UiScheduler::new(native.clone());
        (native, scheduler)
    }

    fn push_marker(
        scheduler: &UiScheduler,
        order: &Arc<Mutex<Vec<usize>>>,
        n: usize,
        view_tree: bool,
    ) {
        let order = Arc::clone(order);
        scheduler.schedule_task(
            Duration::ZERO,
            view_tree,
            Box::new(move || order.lock().push(n)),
        );
    }

    #[test]
    fn many_schedules_one_handoff_fifo_order() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..5 {
            push_marker(&scheduler, &order, n, true);
        }

        // Five schedules, one cross-thread post.
        assert_eq!(native.posts.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), FlushState::FlushScheduled);

        native.pump();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(scheduler.state(), FlushState::Idle);
    }

    #[test]
    fn tasks_scheduled_during_flush_get_a_fresh_post() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_order = Arc::clone(&order);
        let inner_scheduler = scheduler.clone();
        scheduler.schedule_task(
            Duration::ZERO,
            false,
            Box::new(move || {
                inner_order.lock().push(1);
                let nested = Arc::clone(&inner_order);
                inner_scheduler.schedule_task(
                    Duration::ZERO,
                    false,
                    Box::new(move || nested.lock().push(2)),
                );
            }),
        );

        native.pump();
        assert_eq!(*order.lock(), vec![1, 2]);
        assert_eq!(native.posts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delayed_tasks_join_a_later_batch() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        let delayed = Arc::clone(&order);
        scheduler.schedule_task(
            Duration::from_millis(16),
            false,
            Box::new(move || delayed.lock().push(99)),
        );
        push_marker(&scheduler, &order, 1, false);

        native.pump();
        assert_eq!(*order.lock(), vec![1]);

        native.fire_delayed();
        native.pump();
        assert_eq!(*order.lock(), vec![1, 99]);
    }

    #[test]
    fn view_tree_batches_are_bracketed() {
        struct Brackets {
            events: Mutex<Vec<&'static str>>,
        }

        impl ViewTreeListener for Brackets {
            fn on_update_enqueued(&self) {
                self.events.lock().push("begin");
            }

            fn on_update_finished(&self) {
                self.events.lock().push("end");
            }
        }

        let (native, scheduler) = setup();
        let brackets = Arc::new(Brackets {
            events: Mutex::new(Vec::new()),
        });
        scheduler.set_view_tree_listener(brackets.clone());

        let order = Arc::new(Mutex::new(Vec::new()));
        push_marker(&scheduler, &order, 1, true);
        push_marker(&scheduler, &order, 2, true);
        push_marker(&scheduler, &order, 3, false);
        push_marker(&scheduler, &order, 4, true);

        native.pump();

        // Two view-tree runs (1,2) and (4), one plain run (3) in between.
        assert_eq!(
            *brackets.events.lock(),
            vec!["begin", "end", "begin", "end"]
        );
        assert_eq!(*order.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn panic_aborts_batch_but_not_later_batches() {
        struct Recorder {
            errors: Mutex<Vec<RenderError>>,
        }

        impl ExceptionListener for Recorder {
            fn on_render_exception(&self, error: RenderError) {
                self.errors.lock().push(error);
            }
        }

        let (native, scheduler) = setup();
        let recorder = Arc::new(Recorder {
            errors: Mutex::new(Vec::new()),
        });
        scheduler.set_exception_listener(recorder.clone());

        let order = Arc::new(Mutex::new(Vec::new()));
        push_marker(&scheduler, &order, 1, true);
        scheduler.schedule_task(Duration::ZERO, true, Box::new(|| panic!("bad mutation")));
        push_marker(&scheduler, &order, 2, true);
        // A different-kind task starts a new batch and must survive.
        push_marker(&scheduler, &order, 3, false);

        native.pump();

        // Task 2 sat behind the panic in the same batch and was skipped.
        assert_eq!(*order.lock(), vec![1, 3]);

        let errors = recorder.errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason, crate::error::RenderReason::FlushFailure);
        assert!(errors[0].message.contains("bad mutation"));
    }

    #[test]
    fn first_flush_opens_the_gate() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        let gated = Arc::clone(&order);
        scheduler.perform_when_view_did_load(Box::new(move || gated.lock().push(100)));
        assert!(!scheduler.view_did_load());
        assert!(order.lock().is_empty());

        push_marker(&scheduler, &order, 1, true);
        native.pump();

        // The flush completed, so the gated task ran after the batch.
        assert!(scheduler.view_did_load());
        assert_eq!(*order.lock(), vec![1, 100]);

        // Later submissions run inline.
        let inline = Arc::clone(&order);
        scheduler.perform_when_view_did_load(Box::new(move || inline.lock().push(101)));
        assert_eq!(*order.lock(), vec![1, 100, 101]);
    }

    #[test]
    fn empty_flush_leaves_the_gate_closed() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        let gated = Arc::clone(&order);
        scheduler.perform_when_view_did_load(Box::new(move || gated.lock().push(100)));

        // Nothing is pending, so this drains an empty queue.
        scheduler.flush_sync();
        assert!(!scheduler.view_did_load());
        assert!(order.lock().is_empty());

        push_marker(&scheduler, &order, 1, true);
        native.pump();
        assert!(scheduler.view_did_load());
        assert_eq!(*order.lock(), vec![1, 100]);
    }

    #[test]
    fn view_tree_listener_may_replace_itself_mid_batch() {
        struct Swapper {
            events: Arc<Mutex<Vec<&'static str>>>,
            scheduler: UiScheduler,
            replacement: Arc<Tail>,
        }

        struct Tail {
            events: Arc<Mutex<Vec<&'static str>>>,
        }

        impl ViewTreeListener for Swapper {
            fn on_update_enqueued(&self) {
                self.events.lock().push("old-begin");
                self.scheduler
                    .set_view_tree_listener(self.replacement.clone());
            }

            fn on_update_finished(&self) {
                self.events.lock().push("old-end");
            }
        }

        impl ViewTreeListener for Tail {
            fn on_update_enqueued(&self) {
                self.events.lock().push("new-begin");
            }

            fn on_update_finished(&self) {
                self.events.lock().push("new-end");
            }
        }

        let (native, scheduler) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        let replacement = Arc::new(Tail {
            events: Arc::clone(&events),
        });
        scheduler.set_view_tree_listener(Arc::new(Swapper {
            events: Arc::clone(&events),
            scheduler: scheduler.clone(),
            replacement,
        }));

        let order = Arc::new(Mutex::new(Vec::new()));
        push_marker(&scheduler, &order, 1, true);
        native.pump();
        push_marker(&scheduler, &order, 2, true);
        native.pump();

        // The old listener brackets its own batch; the swap takes effect
        // from the next one.
        assert_eq!(
            *events.lock(),
            vec!["old-begin", "old-end", "new-begin", "new-end"]
        );
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn flush_sync_on_native_thread_drains_inline() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        push_marker(&scheduler, &order, 1, false);
        scheduler.flush_sync();
        assert_eq!(*order.lock(), vec![1]);

        // The earlier post is now a no-op flush of an empty queue.
        native.pump();
        assert_eq!(*order.lock(), vec![1]);
    }

    #[test]
    fn destroy_discards_pending_and_refuses_new_work() {
        let (native, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        push_marker(&scheduler, &order, 1, false);
        scheduler.destroy();
        push_marker(&scheduler, &order, 2, false);

        native.pump();
        assert!(order.lock().is_empty());
        assert_eq!(scheduler.state(), FlushState::Idle);
    }
}
