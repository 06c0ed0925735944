//! Test utilities for pipelab.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Virtual scheduler and fixture constructors
//!
//! # Example
//! ```
//! use pipelab::test_utils::{init_test_logging, run_harness};
//!
//! init_test_logging();
//! run_harness(|ctx| async move {
//!     pipelab::time::sleep(std::time::Duration::from_secs(2)).await;
//!     assert_eq!(ctx.steps(), [std::time::Duration::from_secs(2)]);
//! });
//! ```

use crate::config::{Backend, HarnessConfig};
use crate::harness::{Fixture, TestContext};
use crate::lab::{LabConfig, VirtualScheduler};
use crate::tracing_compat::Level;
use std::future::Future;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops. Without
/// `tracing-integration` nothing is installed.
pub fn init_test_logging_with_level(level: Level) {
    INIT_LOGGING.call_once(|| install_subscriber(level));
}

#[cfg(feature = "tracing-integration")]
fn install_subscriber(level: Level) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .try_init();
}

#[cfg(not(feature = "tracing-integration"))]
fn install_subscriber(_level: Level) {}

/// Acquire the global environment lock for tests that mutate env vars.
///
/// A test that panicked while holding the lock does not poison it for the
/// others.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a virtual scheduler with the default thresholds.
#[must_use]
pub fn test_lab() -> Rc<VirtualScheduler> {
    Rc::new(VirtualScheduler::new(LabConfig::default()))
}

/// Create a virtual scheduler with a custom stuck threshold.
#[must_use]
pub fn test_lab_with_threshold(stuck_threshold: u64) -> Rc<VirtualScheduler> {
    Rc::new(VirtualScheduler::new(
        LabConfig::new().stuck_threshold(stuck_threshold),
    ))
}

/// Run `body` on a fresh virtual-time fixture.
///
/// # Panics
///
/// Panics if the fixture reports an error (stuck loop, leaked resource).
pub fn run_harness<F, Fut>(body: F) -> Fut::Output
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future + 'static,
    Fut::Output: 'static,
{
    run_harness_on(Backend::Virtual, body)
}

/// Run `body` on a fresh fixture for `backend`.
///
/// # Panics
///
/// Panics if the fixture reports an error (stuck loop, leaked resource).
pub fn run_harness_on<F, Fut>(backend: Backend, body: F) -> Fut::Output
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future + 'static,
    Fut::Output: 'static,
{
    init_test_logging();
    let fixture = match Fixture::new(HarnessConfig::new(backend)) {
        Ok(fixture) => fixture,
        Err(err) => panic!("fixture setup failed: {err}"),
    };
    match fixture.run(body) {
        Ok(output) => output,
        Err(err) => panic!("fixture failed: {err}"),
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::tracing_compat::info!(phase = %$name, "========================================");
        $crate::tracing_compat::info!(phase = %$name, "TEST PHASE: {}", $name);
        $crate::tracing_compat::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::tracing_compat::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::tracing_compat::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Assert a condition and log the expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        $crate::tracing_compat::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Scheduler;
    use std::time::Duration;

    #[test]
    fn run_harness_returns_output() {
        let steps = run_harness(|ctx| async move {
            crate::time::sleep(Duration::from_secs(2)).await;
            ctx.steps()
        });
        assert_eq!(steps, [Duration::from_secs(2)]);
    }

    #[test]
    fn test_lab_with_threshold_applies() {
        let lab = test_lab_with_threshold(7);
        assert_eq!(lab.config().stuck_threshold, 7);
        assert!(!lab.is_closed());
    }

    #[test]
    fn env_lock_survives_poison() {
        let _ = std::thread::spawn(|| {
            let _guard = env_lock();
            panic!("poison");
        })
        .join();
        drop(env_lock());
    }
}
