//! Pending timer registry for the virtual scheduler.
//!
//! Timers are kept in an ordered map keyed by `(deadline, timer_id)`. Timer
//! ids are allocated in registration order, so iteration order is:
//!
//! - Earliest deadline first
//! - Registration order (FIFO) among equal deadlines
//!
//! Cancellation removes the entry eagerly; cancelling a timer that already
//! fired is a no-op.
//!
//! # Example
//!
//! ```ignore
//! let mut timers = TimerRegistry::new();
//! let a = timers.insert(Time::from_secs(5), waker1);
//! let b = timers.insert(Time::from_secs(2), waker2);
//!
//! assert_eq!(timers.next_deadline(), Some(Time::from_secs(2)));
//! let fired = timers.pop_due(Time::from_secs(5));   // b, then a
//! ```

use crate::types::{Time, TimerId};
use std::collections::{BTreeMap, HashMap};
use std::task::Waker;

/// A timer handle for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: TimerId,
    deadline: Time,
}

impl TimerHandle {
    /// Returns the timer ID.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// Returns the deadline the timer was registered for.
    #[must_use]
    pub const fn deadline(&self) -> Time {
        self.deadline
    }
}

/// A timer removed from the registry because its deadline was reached.
#[derive(Debug)]
pub struct ExpiredTimer {
    /// Timer ID.
    pub id: TimerId,
    /// Deadline the timer was registered for.
    pub deadline: Time,
    /// Waker of the suspended task.
    pub waker: Waker,
}

impl ExpiredTimer {
    /// Wakes the suspended task.
    pub fn fire(self) {
        self.waker.wake();
    }
}

/// Ordered set of pending timers.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    pending: BTreeMap<(Time, TimerId), Waker>,
    deadlines: HashMap<TimerId, Time>,
    next_id: u64,
}

impl TimerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no timer is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Registers a timer for `deadline`.
    pub fn insert(&mut self, deadline: Time, waker: Waker) -> TimerHandle {
        let id = TimerId::from_raw(self.next_id);
        self.next_id += 1;
        self.pending.insert((deadline, id), waker);
        self.deadlines.insert(id, deadline);
        TimerHandle { id, deadline }
    }

    /// Removes a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.pending.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Returns true if the timer is still pending.
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.pending.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Removes every timer whose deadline is at or before `now`, in firing order.
    pub fn pop_due(&mut self, now: Time) -> Vec<ExpiredTimer> {
        let mut expired = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let (deadline, id) = *entry.key();
            if deadline > now {
                break;
            }
            let waker = entry.remove();
            self.deadlines.remove(&id);
            expired.push(ExpiredTimer {
                id,
                deadline,
                waker,
            });
        }
        expired
    }

    /// Drops every pending timer without firing it.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Wake;

    /// A waker that counts how many times it has been woken.
    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_waker() -> (Arc<CountingWaker>, Waker) {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        (counter, waker)
    }

    #[test]
    fn new_registry_is_empty() {
        let timers = TimerRegistry::new();
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn pops_in_deadline_order() {
        let mut timers = TimerRegistry::new();
        let (_, w1) = counting_waker();
        let (_, w2) = counting_waker();
        let (_, w3) = counting_waker();
        timers.insert(Time::from_secs(100), w1);
        timers.insert(Time::from_secs(50), w2);
        timers.insert(Time::from_secs(200), w3);

        let fired = timers.pop_due(Time::from_secs(75));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].deadline, Time::from_secs(50));

        let fired = timers.pop_due(Time::from_secs(250));
        let deadlines: Vec<_> = fired.iter().map(|t| t.deadline).collect();
        assert_eq!(deadlines, vec![Time::from_secs(100), Time::from_secs(200)]);
        assert!(timers.is_empty());
    }

    #[test]
    fn equal_deadlines_fire_in_registration_order() {
        let mut timers = TimerRegistry::new();
        let handles: Vec<_> = (0..4)
            .map(|_| timers.insert(Time::from_secs(7), counting_waker().1))
            .collect();

        let fired: Vec<_> = timers
            .pop_due(Time::from_secs(7))
            .into_iter()
            .map(|t| t.id)
            .collect();
        let expected: Vec<_> = handles.iter().map(TimerHandle::id).collect();
        assert_eq!(fired, expected);
    }

    #[test]
    fn cancel_removes_pending() {
        let mut timers = TimerRegistry::new();
        let h1 = timers.insert(Time::from_secs(50), counting_waker().1);
        let h2 = timers.insert(Time::from_secs(100), counting_waker().1);

        assert!(timers.cancel(h1.id()));
        assert!(!timers.contains(h1.id()));
        assert_eq!(timers.next_deadline(), Some(Time::from_secs(100)));

        let fired = timers.pop_due(Time::from_secs(100));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, h2.id());
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut timers = TimerRegistry::new();
        let h = timers.insert(Time::from_secs(1), counting_waker().1);
        assert_eq!(timers.pop_due(Time::from_secs(1)).len(), 1);
        assert!(!timers.cancel(h.id()));
        assert!(!timers.cancel(h.id()));
    }

    #[test]
    fn fire_wakes_task() {
        let mut timers = TimerRegistry::new();
        let (counter, waker) = counting_waker();
        timers.insert(Time::ZERO, waker);
        for timer in timers.pop_due(Time::ZERO) {
            timer.fire();
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_drops_without_waking() {
        let mut timers = TimerRegistry::new();
        let (counter, waker) = counting_waker();
        timers.insert(Time::from_secs(3), waker);
        timers.clear();
        assert!(timers.is_empty());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }
}
