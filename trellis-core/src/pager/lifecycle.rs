//! Page Lifecycle
//!
//! The host drives each page through a fixed sequence of stages and reports
//! them into the core. The tracker records a timestamp per stage so hosts
//! can measure page-create cost (core init, context init, first paint)
//! without instrumenting the core itself.
//!
//! Expected order per page:
//! init → preload-class-finish → core-init start/finish → context-init
//! start/finish → instance-create start/finish → first-frame-paint →
//! {resume, pause}* → destroy.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A stage of a page's lifecycle, in host-call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    Init,
    PreloadClassFinish,
    CoreInitStart,
    CoreInitFinish,
    ContextInitStart,
    ContextInitFinish,
    InstanceCreateStart,
    InstanceCreateFinish,
    FirstFramePaint,
    Resume,
    Pause,
    Destroy,
}

impl LifecycleStage {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStage::Init => "init",
            LifecycleStage::PreloadClassFinish => "preload_class_finish",
            LifecycleStage::CoreInitStart => "core_init_start",
            LifecycleStage::CoreInitFinish => "core_init_finish",
            LifecycleStage::ContextInitStart => "context_init_start",
            LifecycleStage::ContextInitFinish => "context_init_finish",
            LifecycleStage::InstanceCreateStart => "instance_create_start",
            LifecycleStage::InstanceCreateFinish => "instance_create_finish",
            LifecycleStage::FirstFramePaint => "first_frame_paint",
            LifecycleStage::Resume => "resume",
            LifecycleStage::Pause => "pause",
            LifecycleStage::Destroy => "destroy",
        }
    }
}

/// Records when each lifecycle stage was reported for one pager.
///
/// Repeatable stages (resume/pause) keep their first timestamp; the
/// create-path stages only occur once anyway.
pub struct LifecycleTracker {
    marks: Mutex<Vec<(LifecycleStage, Instant)>>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self {
            marks: Mutex::new(Vec::new()),
        }
    }

    /// Record a stage. The first report of a stage wins.
    pub fn mark(&self, stage: LifecycleStage) {
        let mut marks = self.marks.lock();
        if marks.iter().all(|(s, _)| *s != stage) {
            marks.push((stage, Instant::now()));
        }
    }

    pub fn has(&self, stage: LifecycleStage) -> bool {
        self.marks.lock().iter().any(|(s, _)| *s == stage)
    }

    /// Stages recorded so far, in report order.
    pub fn stages(&self) -> Vec<LifecycleStage> {
        self.marks.lock().iter().map(|(s, _)| *s).collect()
    }

    /// Elapsed time between two recorded stages, if both happened in order.
    pub fn elapsed_between(&self, from: LifecycleStage, to: LifecycleStage) -> Option<Duration> {
        let marks = self.marks.lock();
        let start = marks.iter().find(|(s, _)| *s == from)?.1;
        let end = marks.iter().find(|(s, _)| *s == to)?.1;
        end.checked_duration_since(start)
    }
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_record_in_report_order() {
        let tracker = LifecycleTracker::new();
        tracker.mark(LifecycleStage::Init);
        tracker.mark(LifecycleStage::CoreInitStart);
        tracker.mark(LifecycleStage::CoreInitFinish);

        assert_eq!(
            tracker.stages(),
            vec![
                LifecycleStage::Init,
                LifecycleStage::CoreInitStart,
                LifecycleStage::CoreInitFinish,
            ]
        );
    }

    #[test]
    fn first_report_of_a_stage_wins() {
        let tracker = LifecycleTracker::new();
        tracker.mark(LifecycleStage::Resume);
        tracker.mark(LifecycleStage::Resume);

        assert_eq!(tracker.stages().len(), 1);
    }

    #[test]
    fn elapsed_between_needs_both_stages() {
        let tracker = LifecycleTracker::new();
        tracker.mark(LifecycleStage::CoreInitStart);

        assert!(tracker
            .elapsed_between(LifecycleStage::CoreInitStart, LifecycleStage::CoreInitFinish)
            .is_none());

        tracker.mark(LifecycleStage::CoreInitFinish);
        assert!(tracker
            .elapsed_between(LifecycleStage::CoreInitStart, LifecycleStage::CoreInitFinish)
            .is_some());
    }
}
