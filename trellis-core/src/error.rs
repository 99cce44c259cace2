//! Error Taxonomy
//!
//! Errors in the core fall into two very different categories, and the
//! propagation policy differs on purpose:
//!
//! - Failures during page *creation* are genuine configuration faults on the
//!   logic side. They are raised synchronously as [`CoreError`] values.
//!
//! - Failures on the boundary-routing paths (events, callbacks, layout
//!   notifications arriving from the native side) are expected races with
//!   page teardown. Those paths never return errors; they log at debug level
//!   and drop the operation.
//!
//! Render exceptions are a third kind: they are raised while executing a
//! batch on the native thread and are delivered out-of-band through an
//! exception listener rather than unwinding into the host run loop.

use thiserror::Error;

use crate::pager::PagerId;

/// Hard errors raised synchronously to the logic side.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No page factory is registered under the requested name, or an
    /// operation that requires a live pager referenced a destroyed one at
    /// creation time.
    #[error("no page registered under \"{name}\"")]
    PagerNotFound { name: String },

    /// No live reactive observer exists behind the pager id: the pager is
    /// unknown or its observer has been torn down. Raised from checked
    /// accessors rather than handing out a dead graph handle.
    #[error("pager {id:?} has no live reactive observer")]
    ObserverNotFound { id: PagerId },
}

/// The fixed reason attached to a reported render exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderReason {
    /// A scheduled batch panicked while flushing on the native thread.
    FlushFailure,

    /// The host reported an exception through the out-of-band lifecycle
    /// hook (e.g. a native view threw while applying a mutation).
    HostException,
}

/// An exception surfaced to the host's exception listener.
///
/// Render errors never terminate the process and never poison the
/// scheduler: they abort only the batch that raised them.
#[derive(Debug, Clone)]
pub struct RenderError {
    pub reason: RenderReason,
    pub message: String,
}

impl RenderError {
    pub fn flush_failure(message: impl Into<String>) -> Self {
        Self {
            reason: RenderReason::FlushFailure,
            message: message.into(),
        }
    }

    pub fn host_exception(message: impl Into<String>) -> Self {
        Self {
            reason: RenderReason::HostException,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "render exception ({:?}): {}", self.reason, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pager_not_found_names_the_page() {
        let err = CoreError::PagerNotFound {
            name: "Home".to_string(),
        };
        assert!(err.to_string().contains("Home"));
    }

    #[test]
    fn render_error_carries_fixed_reason() {
        let err = RenderError::flush_failure("boom");
        assert_eq!(err.reason, RenderReason::FlushFailure);
        assert!(err.to_string().contains("boom"));
    }
}
