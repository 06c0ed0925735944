//! Stuck-loop detection.
//!
//! The detector counts consecutive busy turns, that is turns in which no time
//! jump happened. It decides when the scheduler should jump the clock:
//!
//! ```text
//! stuck      = busy_turns > threshold
//! time_to_go = timers_pending && (stuck || !runnable)
//! ```
//!
//! Runnable work always runs before time moves, unless the loop has been
//! spinning long enough to look like a task rescheduling itself forever. A
//! stuck loop with nothing runnable and no timer to jump to can never make
//! progress; the scheduler reports it as a fatal error.

use crate::lab::config::DEFAULT_STUCK_THRESHOLD;

/// Busy-turn counter for one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckDetector {
    busy_turns: u64,
    threshold: u64,
}

impl StuckDetector {
    /// Creates a detector with the given threshold.
    #[must_use]
    pub const fn new(threshold: u64) -> Self {
        Self {
            busy_turns: 0,
            threshold,
        }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Returns the number of turns since the last jump.
    #[must_use]
    pub const fn busy_turns(&self) -> u64 {
        self.busy_turns
    }

    /// Records a completed turn.
    pub fn on_turn(&mut self) {
        self.busy_turns = self.busy_turns.saturating_add(1);
    }

    /// Records a time jump.
    pub fn on_jump(&mut self) {
        self.busy_turns = 0;
    }

    /// Returns true once the loop has spun past the threshold.
    #[must_use]
    pub const fn is_stuck(&self) -> bool {
        self.busy_turns > self.threshold
    }

    /// Returns true if the scheduler should jump to the next timer now.
    #[must_use]
    pub const fn time_to_go(&self, timers_pending: bool, runnable: bool) -> bool {
        timers_pending && (self.is_stuck() || !runnable)
    }

    /// Clears the busy-turn counter.
    pub fn reset(&mut self) {
        self.busy_turns = 0;
    }
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STUCK_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuck_only_past_threshold() {
        let mut detector = StuckDetector::new(3);
        for _ in 0..3 {
            detector.on_turn();
        }
        assert!(!detector.is_stuck(), "exactly threshold turns is not stuck");
        detector.on_turn();
        assert!(detector.is_stuck());
    }

    #[test]
    fn jump_resets() {
        let mut detector = StuckDetector::new(1);
        detector.on_turn();
        detector.on_turn();
        assert!(detector.is_stuck());
        detector.on_jump();
        assert_eq!(detector.busy_turns(), 0);
        assert!(!detector.is_stuck());
    }

    #[test]
    fn time_to_go_truth_table() {
        let mut detector = StuckDetector::new(0);
        // fresh: not stuck
        assert!(!detector.time_to_go(false, false));
        assert!(!detector.time_to_go(false, true));
        assert!(detector.time_to_go(true, false));
        assert!(!detector.time_to_go(true, true));

        detector.on_turn();
        assert!(detector.is_stuck());
        assert!(!detector.time_to_go(false, true));
        assert!(detector.time_to_go(true, true));
    }

    #[test]
    fn default_threshold_is_one_hundred() {
        assert_eq!(StuckDetector::default().threshold(), 100);
    }
}
