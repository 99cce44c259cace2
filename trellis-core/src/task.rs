//! Task Manager
//!
//! Each pager owns one TaskManager: a microtask queue drained once per
//! tick. Its job is coalescing — any number of `next_tick` calls within one
//! tick share a single zero-delay timer — and teardown safety: destroying
//! the manager clears the queue without executing anything.
//!
//! # Drain Semantics
//!
//! When the timer fires, the queue is snapshotted and cleared atomically,
//! then the snapshot executes in FIFO order. Tasks enqueued *during* the
//! drain land in a fresh queue (and schedule a fresh timer) rather than the
//! one being drained, which prevents a task from extending its own tick
//! forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::host::TimerHost;

pub use crate::host::Task;

/// Per-pager microtask (next-tick) queue.
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    queue: Mutex<Vec<Task>>,
    timer: Arc<dyn TimerHost>,
    destroyed: AtomicBool,
}

impl TaskManager {
    pub fn new(timer: Arc<dyn TimerHost>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                queue: Mutex::new(Vec::new()),
                timer,
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue a task for the next tick.
    ///
    /// If the queue was empty, exactly one zero-delay timer is scheduled to
    /// drain it; subsequent same-tick calls just append.
    pub fn next_tick(&self, task: Task) {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let was_empty = {
            let mut queue = self.inner.queue.lock();
            let was_empty = queue.is_empty();
            queue.push(task);
            was_empty
        };

        if was_empty {
            let inner = Arc::clone(&self.inner);
            self.inner.timer.post_delayed(
                Duration::ZERO,
                Box::new(move || {
                    inner.drain();
                }),
            );
        }
    }

    /// Clear the queue without executing it. Idempotent.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.queue.lock().clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting for the next drain.
    pub fn queued_len(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

impl Clone for TaskManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ManagerInner {
    fn drain(&self) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        // Snapshot-and-clear: tasks enqueued by the batch go to the fresh
        // queue behind the lock, never the batch being executed.
        let batch = std::mem::take(&mut *self.queue.lock());
        for task in batch {
            if self.destroyed.load(Ordering::SeqCst) {
                return;
            }
            task();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
