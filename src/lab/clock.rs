//! Virtual clock.
//!
//! The clock never reads wall time. It starts at [`Time::ZERO`] and moves
//! only when the scheduler jumps it forward to the next pending timer.

use crate::types::Time;
use std::time::Duration;

/// A monotonic virtual clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualClock {
    now: Time,
}

impl VirtualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { now: Time::ZERO }
    }

    /// Creates a clock starting at `now`.
    #[must_use]
    pub const fn starting_at(now: Time) -> Self {
        Self { now }
    }

    /// Returns the current virtual time.
    #[must_use]
    pub const fn now(&self) -> Time {
        self.now
    }

    /// Moves the clock forward by `delta`.
    ///
    /// A zero delta is a no-op and returns `false`.
    pub fn advance(&mut self, delta: Duration) -> bool {
        if delta.is_zero() {
            return false;
        }
        self.now = self.now.saturating_add(delta);
        true
    }

    /// Moves the clock to `target` if it lies in the future.
    ///
    /// Returns the step actually taken; zero when `target` is not ahead.
    pub fn advance_to(&mut self, target: Time) -> Duration {
        let step = target.elapsed_since(self.now);
        self.advance(step);
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(VirtualClock::new().now(), Time::ZERO);
    }

    #[test]
    fn advance_moves_forward() {
        let mut clock = VirtualClock::new();
        assert!(clock.advance(Duration::from_secs(2)));
        assert!(clock.advance(Duration::from_millis(500)));
        assert_eq!(clock.now(), Time::from_millis(2500));
    }

    #[test]
    fn zero_advance_is_noop() {
        let mut clock = VirtualClock::starting_at(Time::from_secs(3));
        assert!(!clock.advance(Duration::ZERO));
        assert_eq!(clock.now(), Time::from_secs(3));
    }

    #[test]
    fn advance_to_never_goes_back() {
        let mut clock = VirtualClock::starting_at(Time::from_secs(10));
        assert_eq!(clock.advance_to(Time::from_secs(4)), Duration::ZERO);
        assert_eq!(clock.now(), Time::from_secs(10));
        assert_eq!(clock.advance_to(Time::from_secs(15)), Duration::from_secs(5));
        assert_eq!(clock.now(), Time::from_secs(15));
    }
}
