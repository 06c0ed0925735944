//! Configuration for the virtual-time scheduler.
//!
//! The lab configuration controls how the scheduler decides it is stuck and
//! how long teardown may spend draining detached cleanup work:
//! - Busy-turn threshold for the stuck detector
//! - Turn budget for the post-test drain

/// Default number of consecutive busy turns tolerated before the loop is stuck.
pub const DEFAULT_STUCK_THRESHOLD: u64 = 100;

/// Default turn budget for draining tasks after the test body finishes.
pub const DEFAULT_MAX_DRAIN_TURNS: usize = 100_000;

/// Configuration for the virtual-time scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabConfig {
    /// A loop is stuck once it has spun strictly more than this many turns
    /// without a time jump.
    pub stuck_threshold: u64,
    /// Maximum turns spent running leftover tasks at teardown.
    pub max_drain_turns: usize,
}

impl LabConfig {
    /// Creates a configuration with the default thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stuck_threshold: DEFAULT_STUCK_THRESHOLD,
            max_drain_turns: DEFAULT_MAX_DRAIN_TURNS,
        }
    }

    /// Sets the stuck threshold.
    #[must_use]
    pub const fn stuck_threshold(mut self, turns: u64) -> Self {
        self.stuck_threshold = turns;
        self
    }

    /// Sets the teardown drain budget.
    #[must_use]
    pub const fn max_drain_turns(mut self, turns: usize) -> Self {
        self.max_drain_turns = turns;
        self
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LabConfig::default();
        assert_eq!(config.stuck_threshold, 100);
        assert_eq!(config.max_drain_turns, 100_000);
    }

    #[test]
    fn builder_setters() {
        let config = LabConfig::new().stuck_threshold(5).max_drain_turns(10);
        assert_eq!(config.stuck_threshold, 5);
        assert_eq!(config.max_drain_turns, 10);
    }
}
