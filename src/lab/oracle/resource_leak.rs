//! Resource leak oracle: every opened resource is released before teardown.
//!
//! Probe operators open a resource when they start streaming and release it
//! after their cleanup delay. The tracker counts both events and the fixture
//! asserts `open_now == 0` when the test finishes.
//!
//! # Invariant
//!
//! Formally: `at teardown: open_now = 0`
//!
//! # Usage
//!
//! ```ignore
//! let tracker = ResourceTracker::new();
//!
//! let guard = tracker.acquire(None);   // opened_total = 1, open_now = 1
//! drop(guard);                         // open_now = 0
//!
//! tracker.check()?;
//! ```
//!
//! The tracker is an injected context object: each fixture owns one and hands
//! clones to the probes it builds. Nothing is process-global, so resource
//! counts cannot leak from one test into the next.

use crate::tracing_compat::{debug, trace};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// A resource leak violation.
///
/// Resources were still open when the owning test tore down. `labels` names
/// each offending probe so the leak can be traced back to its operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLeakViolation {
    /// Number of resources still open.
    pub open: usize,
    /// Number of resources opened over the whole test.
    pub opened_total: usize,
    /// Labels of the resources still open, in opening order.
    pub labels: Vec<String>,
}

impl fmt::Display for ResourceLeakViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} resource(s) still open at teardown: {:?}",
            self.open, self.opened_total, self.labels
        )
    }
}

impl std::error::Error for ResourceLeakViolation {}

#[derive(Debug, Default)]
struct TrackerInner {
    opened_total: AtomicUsize,
    open_now: AtomicUsize,
    next_id: AtomicU64,
    /// Bumped by `reset`; guards from an older epoch release nothing.
    epoch: AtomicU64,
    open: Mutex<BTreeMap<u64, String>>,
}

/// Shared counters for resources opened by probe operators.
///
/// Cloning is cheap and every clone observes the same counters.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    inner: Arc<TrackerInner>,
}

impl ResourceTracker {
    /// Creates a new, balanced tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a resource and returns the guard that releases it.
    ///
    /// Increments both `opened_total` and `open_now`. Without a label the
    /// resource is named `probe#<n>`, `n` being its opening ordinal.
    pub fn acquire(&self, label: Option<&str>) -> OpenResource {
        let ordinal = self.inner.opened_total.fetch_add(1, Ordering::SeqCst) + 1;
        let open_now = self.inner.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let label = label.map_or_else(|| format!("probe#{ordinal}"), str::to_owned);
        debug!(resource = %label, open_now, opened_total = ordinal, "resource opened");
        self.inner.open.lock().insert(id, label);
        OpenResource {
            tracker: self.clone(),
            id,
            epoch,
            released: false,
        }
    }

    /// Returns the number of resources currently open.
    #[must_use]
    pub fn open_now(&self) -> usize {
        self.inner.open_now.load(Ordering::SeqCst)
    }

    /// Returns the number of resources opened since the last reset.
    #[must_use]
    pub fn opened_total(&self) -> usize {
        self.inner.opened_total.load(Ordering::SeqCst)
    }

    /// Returns the labels of the resources currently open.
    #[must_use]
    pub fn open_labels(&self) -> Vec<String> {
        self.inner.open.lock().values().cloned().collect()
    }

    /// Verifies that every opened resource has been released.
    pub fn check(&self) -> Result<(), ResourceLeakViolation> {
        let open = self.open_now();
        if open == 0 {
            return Ok(());
        }
        Err(ResourceLeakViolation {
            open,
            opened_total: self.opened_total(),
            labels: self.open_labels(),
        })
    }

    /// Resets the tracker to its balanced initial state.
    ///
    /// Guards handed out before the reset become inert: releasing them later
    /// does not touch the fresh counters.
    pub fn reset(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.open.lock().clear();
        self.inner.open_now.store(0, Ordering::SeqCst);
        self.inner.opened_total.store(0, Ordering::SeqCst);
    }

    fn release(&self, id: u64, epoch: u64) {
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            trace!(id, "release of resource from a previous epoch ignored");
            return;
        }
        let label = self.inner.open.lock().remove(&id);
        let prev = self
            .inner
            .open_now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        debug!(
            resource = ?label,
            open_now = prev.map_or(0, |n| n - 1),
            "resource released"
        );
    }
}

/// Guard for one open resource.
///
/// Dropping the guard releases the resource exactly once, on every exit
/// path including task cancellation and unwinding.
#[derive(Debug)]
#[must_use = "dropping the guard releases the resource immediately"]
pub struct OpenResource {
    tracker: ResourceTracker,
    id: u64,
    epoch: u64,
    released: bool,
}

impl OpenResource {
    /// Releases the resource now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.tracker.release(self.id, self.epoch);
        }
    }
}

impl Drop for OpenResource {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn new_tracker_is_balanced() {
        init_test("new_tracker_is_balanced");
        let tracker = ResourceTracker::new();
        assert_eq!(tracker.open_now(), 0);
        assert_eq!(tracker.opened_total(), 0);
        assert!(tracker.check().is_ok());
        crate::test_complete!("new_tracker_is_balanced");
    }

    #[test]
    fn acquire_and_release_balances() {
        init_test("acquire_and_release_balances");
        let tracker = ResourceTracker::new();
        let a = tracker.acquire(None);
        let b = tracker.acquire(Some("outer"));
        assert_eq!(tracker.open_now(), 2);
        assert_eq!(tracker.opened_total(), 2);
        assert_eq!(tracker.open_labels(), vec!["probe#1", "outer"]);

        a.release();
        drop(b);
        assert_eq!(tracker.open_now(), 0);
        assert_eq!(tracker.opened_total(), 2);
        assert!(tracker.check().is_ok());
        crate::test_complete!("acquire_and_release_balances");
    }

    #[test]
    fn leak_reports_count_and_labels() {
        init_test("leak_reports_count_and_labels");
        let tracker = ResourceTracker::new();
        let _kept = tracker.acquire(Some("leaky"));
        tracker.acquire(None).release();

        let violation = tracker.check().expect_err("expected leak");
        assert_eq!(violation.open, 1);
        assert_eq!(violation.opened_total, 2);
        assert_eq!(violation.labels, vec!["leaky"]);
        assert!(violation.to_string().contains("1 of 2"));
        crate::test_complete!("leak_reports_count_and_labels");
    }

    #[test]
    fn clones_share_counters() {
        init_test("clones_share_counters");
        let tracker = ResourceTracker::new();
        let clone = tracker.clone();
        let guard = clone.acquire(None);
        assert_eq!(tracker.open_now(), 1);
        drop(guard);
        assert_eq!(tracker.open_now(), 0);
        crate::test_complete!("clones_share_counters");
    }

    #[test]
    fn reset_makes_stale_guards_inert() {
        init_test("reset_makes_stale_guards_inert");
        let tracker = ResourceTracker::new();
        let stale = tracker.acquire(None);
        tracker.reset();
        assert_eq!(tracker.open_now(), 0);

        let fresh = tracker.acquire(None);
        drop(stale);
        assert_eq!(tracker.open_now(), 1, "stale guard must not release fresh counters");
        drop(fresh);
        assert_eq!(tracker.open_now(), 0);
        crate::test_complete!("reset_makes_stale_guards_inert");
    }
}
