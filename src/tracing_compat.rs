//! Tracing compatibility layer for the harness's structured logging.
//!
//! Scheduler turns, time jumps, probe open/close events and teardown verdicts
//! are logged through this module so that the harness itself never depends on
//! a subscriber being installed:
//!
//! - **With `tracing-integration`** (default): re-exports from the `tracing` crate.
//! - **Without it**: no-op macros that compile to nothing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pipelab::tracing_compat::{debug, trace};
//!
//! debug!(step_ns = step.as_nanos() as u64, "virtual time jump");
//! trace!(task = %id, "polling task");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, debug_span, error, info, info_span, trace, warn, Level, Span};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op implementations when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    /// No-op debug_span macro.
    #[macro_export]
    macro_rules! debug_span {
        ($($arg:tt)*) => {
            $crate::tracing_compat::NoopSpan
        };
    }

    /// No-op info_span macro.
    #[macro_export]
    macro_rules! info_span {
        ($($arg:tt)*) => {
            $crate::tracing_compat::NoopSpan
        };
    }

    pub use crate::{debug, debug_span, error, info, info_span, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

/// A no-op span returned by the span macros when tracing is disabled.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy)]
pub struct NoopSpan;

#[cfg(not(feature = "tracing-integration"))]
impl NoopSpan {
    /// Returns a no-op guard that does nothing on drop.
    #[inline]
    #[must_use]
    pub fn enter(&self) -> NoopGuard {
        NoopGuard
    }

    /// Returns self (no-op).
    #[inline]
    #[must_use]
    pub fn entered(self) -> Self {
        self
    }
}

/// A no-op span guard that does nothing on drop.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug)]
pub struct NoopGuard;

/// Alias for `NoopSpan` when tracing is disabled.
#[cfg(not(feature = "tracing-integration"))]
pub type Span = NoopSpan;

/// No-op level type for when tracing is disabled.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level;

#[cfg(not(feature = "tracing-integration"))]
impl Level {
    /// Trace level (most verbose).
    pub const TRACE: Self = Self;
    /// Debug level.
    pub const DEBUG: Self = Self;
    /// Info level.
    pub const INFO: Self = Self;
    /// Warn level.
    pub const WARN: Self = Self;
    /// Error level (least verbose).
    pub const ERROR: Self = Self;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn macros_compile_with_fields() {
        init_test_logging();
        crate::test_phase!("macros_compile_with_fields");
        trace!(task = 3_u64, "polling task");
        debug!(step_ns = 5_u64, now_ns = 5_u64, "virtual time jump");
        info!(backend = "virtual", "fixture installed");
        warn!("cleanup degraded");
        error!(open = 1_usize, "resource leak");
        crate::test_complete!("macros_compile_with_fields");
    }

    #[test]
    fn spans_enter() {
        init_test_logging();
        let span = info_span!("fixture", backend = "virtual");
        let _guard = span.enter();
        let _inner = debug_span!("turn").entered();
    }
}
