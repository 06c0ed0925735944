//! Virtual-clock scheduler.
//!
//! The scheduler executes tasks with:
//! - Virtual time that only moves by jumping to the next pending timer
//! - FIFO turn order (one ready task per turn)
//! - A record of every jump, exposed to tests as [`Steps`]
//!
//! # Turn
//!
//! 1. Fire timers that are already due.
//! 2. Poll the ready task that was woken first, if any.
//! 3. Count the turn as busy.
//! 4. If it is time to go (timers pending, and the loop is stuck or nothing
//!    is runnable), jump the clock to the earliest deadline, record the step
//!    if it is positive, fire every timer now due, and reset the busy count.
//!
//! A turn that is stuck, has nothing runnable and no timer to jump to cannot
//! make progress; it fails with [`ErrorKind::StuckLoop`](crate::error::ErrorKind::StuckLoop).

use super::clock::VirtualClock;
use super::config::LabConfig;
use super::stuck::StuckDetector;
use super::timer_registry::TimerRegistry;
use crate::config::Backend;
use crate::error::{Error, Result};
use crate::runtime::{Scheduler, Steps, TaskCore, Turn};
use crate::tracing_compat::{debug, error, trace};
use crate::types::{Time, TimerId};
use std::cell::RefCell;
use std::rc::Rc;
use std::task::Waker;
use std::time::Duration;

#[derive(Debug, Default)]
struct VirtualState {
    clock: VirtualClock,
    timers: TimerRegistry,
    stuck: StuckDetector,
    steps: Vec<Duration>,
}

/// The virtual-clock scheduler.
///
/// Nothing here reads wall time: a test that sleeps for an hour completes in
/// as many turns as it has suspension points.
#[derive(Debug)]
pub struct VirtualScheduler {
    core: Rc<TaskCore>,
    state: RefCell<VirtualState>,
    config: LabConfig,
}

impl VirtualScheduler {
    /// Creates a scheduler at virtual time zero.
    #[must_use]
    pub fn new(config: LabConfig) -> Self {
        Self {
            core: Rc::new(TaskCore::new()),
            state: RefCell::new(VirtualState {
                stuck: StuckDetector::new(config.stuck_threshold),
                ..VirtualState::default()
            }),
            config,
        }
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub const fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Returns the number of busy turns since the last jump.
    #[must_use]
    pub fn busy_turns(&self) -> u64 {
        self.state.borrow().stuck.busy_turns()
    }

    /// Returns true if the loop has spun past the stuck threshold.
    #[must_use]
    pub fn is_stuck(&self) -> bool {
        self.state.borrow().stuck.is_stuck()
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Returns the recorded jumps.
    #[must_use]
    pub fn recorded_steps(&self) -> Vec<Duration> {
        self.state.borrow().steps.clone()
    }

    fn fire_due(&self) -> usize {
        let due = {
            let mut state = self.state.borrow_mut();
            let now = state.clock.now();
            state.timers.pop_due(now)
        };
        let fired = due.len();
        for timer in due {
            trace!(timer_id = timer.id.as_u64(), deadline = %timer.deadline, "timer fired");
            timer.fire();
        }
        fired
    }

    /// Jumps to the earliest deadline if it is time to go.
    fn maybe_jump(&self, runnable: bool) -> Option<(Duration, usize)> {
        let (step, due) = {
            let mut state = self.state.borrow_mut();
            if !state.stuck.time_to_go(!state.timers.is_empty(), runnable) {
                return None;
            }
            let deadline = state.timers.next_deadline()?;
            let forced = runnable;
            let step = state.clock.advance_to(deadline);
            if !step.is_zero() {
                state.steps.push(step);
            }
            let now = state.clock.now();
            debug!(
                step_ns = u64::try_from(step.as_nanos()).unwrap_or(u64::MAX),
                now = %now,
                forced,
                "virtual time jump"
            );
            state.stuck.on_jump();
            (step, state.timers.pop_due(now))
        };
        let fired = due.len();
        for timer in due {
            timer.fire();
        }
        Some((step, fired))
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new(LabConfig::default())
    }
}

impl Scheduler for VirtualScheduler {
    fn backend(&self) -> Backend {
        Backend::Virtual
    }

    fn now(&self) -> Time {
        self.state.borrow().clock.now()
    }

    fn register_timer(&self, deadline: Time, waker: Waker) -> TimerId {
        let handle = self.state.borrow_mut().timers.insert(deadline, waker);
        trace!(timer_id = handle.id().as_u64(), deadline = %deadline, "timer registered");
        handle.id()
    }

    fn cancel_timer(&self, id: TimerId) -> bool {
        self.state.borrow_mut().timers.cancel(id)
    }

    fn has_pending_timers(&self) -> bool {
        !self.state.borrow().timers.is_empty()
    }

    fn core(&self) -> &Rc<TaskCore> {
        &self.core
    }

    fn run_one_turn(&self) -> Result<Turn> {
        if self.core.is_closed() {
            return Err(Error::scheduler_closed());
        }
        let mut turn = Turn {
            fired: self.fire_due(),
            ..Turn::default()
        };
        turn.polled = self.core.poll_next();
        self.state.borrow_mut().stuck.on_turn();

        let runnable = self.core.has_ready();
        if let Some((step, fired)) = self.maybe_jump(runnable) {
            turn.fired += fired;
            turn.jump = (!step.is_zero()).then_some(step);
            return Ok(turn);
        }

        if !runnable && !self.has_pending_timers() {
            if self.core.notify_idle() > 0 {
                return Ok(turn);
            }
            let (stuck, busy_turns) = {
                let state = self.state.borrow();
                (state.stuck.is_stuck(), state.stuck.busy_turns())
            };
            let live_tasks = self.core.live_tasks();
            if stuck && live_tasks > 0 {
                error!(busy_turns, live_tasks, "scheduler stuck: nothing runnable and no timer pending");
                return Err(Error::stuck_loop(busy_turns, live_tasks));
            }
        }
        Ok(turn)
    }

    fn steps(&self) -> Steps {
        Steps::Recorded(self.recorded_steps())
    }

    fn clear_steps(&self) {
        let mut state = self.state.borrow_mut();
        state.steps.clear();
        state.stuck.reset();
    }

    fn close(&self) {
        if self.core.is_closed() {
            return;
        }
        let dropped = self.core.close();
        self.state.borrow_mut().timers.clear();
        debug!(dropped, now = %self.now(), "virtual scheduler closed");
    }
}
