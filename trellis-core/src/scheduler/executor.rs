//! Scheduled Task Wrapper
//!
//! Every task handed to the UI scheduler is tagged with whether it mutates
//! the native view tree. The flush loop groups consecutive same-kind tasks
//! into batches so view-tree batches can be bracketed with the host's
//! layout listener.

use crate::host::Task;

/// One scheduled unit of work, tagged by kind.
pub struct TaskExecutor {
    is_update_view_tree: bool,
    run: Task,
}

impl TaskExecutor {
    pub fn new(is_update_view_tree: bool, run: Task) -> Self {
        Self {
            is_update_view_tree,
            run,
        }
    }

    /// Whether this task mutates the native view tree.
    pub fn is_update_view_tree(&self) -> bool {
        self.is_update_view_tree
    }

    /// Consume and run the task.
    pub fn execute(self) {
        (self.run)();
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("is_update_view_tree", &self.is_update_view_tree)
            .finish()
    }
}
