//! Wall-clock scheduler.
//!
//! Runs tasks against real elapsed time, optionally scaled by a rate so that
//! one real second counts as `rate` seconds on the scheduler's clock. When
//! nothing is runnable the thread sleeps until the next deadline; no jumps
//! are recorded, so [`Steps::Untracked`] is reported.

use crate::config::Backend;
use crate::error::{Error, Result};
use crate::lab::{StuckDetector, TimerRegistry};
use crate::runtime::{Scheduler, Steps, TaskCore, Turn};
use crate::tracing_compat::{debug, error, trace};
use crate::types::{Time, TimerId};
use std::cell::RefCell;
use std::rc::Rc;
use std::task::Waker;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct WallState {
    timers: TimerRegistry,
    stuck: StuckDetector,
}

/// A scheduler driven by the wall clock.
#[derive(Debug)]
pub struct WallScheduler {
    core: Rc<TaskCore>,
    state: RefCell<WallState>,
    started: Instant,
    rate: u32,
    backend: Backend,
}

impl WallScheduler {
    /// Creates a real-time scheduler.
    #[must_use]
    pub fn realtime(stuck_threshold: u64) -> Self {
        Self::with_rate(Backend::Realtime, 1, stuck_threshold)
    }

    /// Creates a scheduler whose clock runs `rate` times faster than real time.
    #[must_use]
    pub fn accelerated(rate: u32, stuck_threshold: u64) -> Self {
        Self::with_rate(Backend::Accelerated, rate, stuck_threshold)
    }

    fn with_rate(backend: Backend, rate: u32, stuck_threshold: u64) -> Self {
        Self {
            core: Rc::new(TaskCore::new()),
            state: RefCell::new(WallState {
                timers: TimerRegistry::new(),
                stuck: StuckDetector::new(stuck_threshold),
            }),
            started: Instant::now(),
            rate: rate.max(1),
            backend,
        }
    }

    /// Returns the clock rate.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    fn to_real(&self, scaled: Duration) -> Duration {
        scaled / self.rate
    }

    fn fire_due(&self) -> usize {
        let now = self.now();
        let due = self.state.borrow_mut().timers.pop_due(now);
        let fired = due.len();
        for timer in due {
            timer.fire();
        }
        fired
    }
}

impl Scheduler for WallScheduler {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn now(&self) -> Time {
        let scaled = self.started.elapsed().as_nanos() * u128::from(self.rate);
        Time::from_nanos(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    fn register_timer(&self, deadline: Time, waker: Waker) -> TimerId {
        self.state.borrow_mut().timers.insert(deadline, waker).id()
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

        if self.core.has_ready() {
            return Ok(turn);
        }
        let next = self.state.borrow().timers.next_deadline();
        if let Some(deadline) = next {
            let wait = self.to_real(deadline.elapsed_since(self.now()));
            if !wait.is_zero() {
                trace!(wait_ns = u64::try_from(wait.as_nanos()).unwrap_or(u64::MAX), "sleeping until next timer");
                std::thread::sleep(wait);
            }
            turn.fired += self.fire_due();
            self.state.borrow_mut().stuck.on_jump();
            return Ok(turn);
        }

        if self.core.notify_idle() > 0 {
            return Ok(turn);
        }
        let (stuck, busy_turns) = {
            let state = self.state.borrow();
            (state.stuck.is_stuck(), state.stuck.busy_turns())
        };
        let live_tasks = self.core.live_tasks();
        if stuck && live_tasks > 0 {
            error!(busy_turns, live_tasks, backend = %self.backend, "scheduler stuck");
            return Err(Error::stuck_loop(busy_turns, live_tasks));
        }
        Ok(turn)
    }

    fn steps(&self) -> Steps {
        Steps::Untracked
    }

    fn clear_steps(&self) {
        self.state.borrow_mut().stuck.reset();
    }

    fn close(&self) {
        if self.core.is_closed() {
            return;
        }
        let dropped = self.core.close();
        self.state.borrow_mut().timers.clear();
        debug!(dropped, backend = %self.backend, "wall scheduler closed");
    }
}
