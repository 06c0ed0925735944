//! Scheduler interface and cooperative task execution.
//!
//! This module contains the single-threaded execution machinery shared by
//! every backend:
//!
//! - [`Scheduler`]: the pluggable interface (turn execution, time source,
//!   timer registration)
//! - [`task_core`]: live tasks and the FIFO ready queue
//! - [`waker`]: deduplicating task wakers
//! - [`task_handle`]: `JoinHandle` for awaiting spawned task results
//! - [`context`]: the scheduler installed on the current thread
//! - [`wall`]: real-time scheduler (optionally accelerated)
//!
//! The virtual-time implementation lives in [`crate::lab`].
//!
//! # Running a future
//!
//! ```ignore
//! use pipelab::lab::{LabConfig, VirtualScheduler};
//! use pipelab::runtime::{self, context};
//! use std::rc::Rc;
//!
//! let scheduler = Rc::new(VirtualScheduler::new(LabConfig::default()));
//! let _guard = context::enter(scheduler.clone());
//! let value = runtime::block_on(async {
//!     pipelab::time::sleep(std::time::Duration::from_secs(5)).await;
//!     7
//! })?;
//! assert_eq!(scheduler.steps(), [std::time::Duration::from_secs(5)]);
//! ```

pub mod context;
pub mod steps;
pub mod stored_task;
pub mod task_core;
pub mod task_handle;
pub mod wall;
pub mod waker;
mod yield_now;

pub use context::{current, enter, try_current, EnterGuard};
pub use steps::Steps;
pub use task_core::TaskCore;
pub use task_handle::{JoinError, JoinHandle};
pub use wall::WallScheduler;
pub use yield_now::{yield_now, YieldNow};

use crate::config::Backend;
use crate::error::{Error, ErrorKind, Result};
use crate::tracing_compat::{trace, warn};
use crate::types::{TaskId, Time, TimerId};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::task::Waker;
use std::time::Duration;

/// What one scheduling turn did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Turn {
    /// The task polled this turn, if any was runnable.
    pub polled: Option<TaskId>,
    /// Number of timers fired this turn.
    pub fired: usize,
    /// The time jump taken this turn. Never zero.
    pub jump: Option<Duration>,
}

impl Turn {
    /// Returns true if the turn polled nothing and fired nothing.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.polled.is_none() && self.fired == 0
    }
}

/// A cooperative single-threaded scheduler.
///
/// Implementations share turn semantics through [`TaskCore`] and differ in
/// how time moves: the virtual scheduler jumps its clock, the wall scheduler
/// sleeps the thread.
pub trait Scheduler: fmt::Debug {
    /// Returns the backend this scheduler implements.
    fn backend(&self) -> Backend;

    /// Returns the current time on this scheduler's clock.
    fn now(&self) -> Time;

    /// Registers a timer that wakes `waker` at `deadline`.
    ///
    /// A deadline that has already passed fires on the next turn.
    fn register_timer(&self, deadline: Time, waker: Waker) -> TimerId;

    /// Cancels a pending timer. No-op if it already fired.
    fn cancel_timer(&self, id: TimerId) -> bool;

    /// Returns true if any timer is pending.
    fn has_pending_timers(&self) -> bool;

    /// Returns the task core.
    fn core(&self) -> &Rc<TaskCore>;

    /// Runs exactly one unit of ready work, then moves time if it is time to go.
    fn run_one_turn(&self) -> Result<Turn>;

    /// Returns the time jumps taken so far.
    fn steps(&self) -> Steps;

    /// Forgets the recorded time jumps and the busy-turn count.
    fn clear_steps(&self);

    /// Drops every task and timer and refuses further work. Idempotent.
    fn close(&self);

    /// Returns true once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool {
        self.core().is_closed()
    }

    /// Runs turns until no task is live, the loop is stuck, or `max_turns`
    /// turns have run. Returns the number of turns run.
    fn run_until_idle(&self, max_turns: usize) -> usize {
        let mut turns = 0;
        while turns < max_turns && self.core().live_tasks() > 0 {
            turns += 1;
            if let Err(err) = self.run_one_turn() {
                warn!(
                    error = %err,
                    live_tasks = self.core().live_tasks(),
                    "drain stopped before all tasks finished"
                );
                break;
            }
        }
        trace!(turns, live_tasks = self.core().live_tasks(), "drain finished");
        turns
    }
}

/// Spawns a task on the active scheduler.
///
/// # Panics
///
/// Panics if no scheduler is installed on this thread.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    spawn_on(current().core(), future)
}

/// Spawns a task on `core`.
///
/// On a closed core the future is dropped at once and the handle resolves to
/// [`JoinError::Refused`].
pub fn spawn_on<F>(core: &Rc<TaskCore>, future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let (mut handle, completion) = JoinHandle::pair(core);
    let id = core.spawn_local(async move {
        let output = future.await;
        completion.complete(output);
    });
    handle.bind(id);
    handle
}

/// Runs `future` to completion on the active scheduler.
///
/// The future runs as an ordinary task, so it observes the same turn order
/// as the tasks it spawns.
///
/// # Errors
///
/// Returns a [`ErrorKind::StuckLoop`] error if the scheduler can no longer
/// make progress, and [`ErrorKind::SchedulerClosed`] if it is closed.
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let scheduler = try_current()
        .ok_or_else(|| Error::internal("block_on called with no scheduler installed"))?;
    if scheduler.is_closed() {
        return Err(Error::scheduler_closed());
    }
    let mut handle = spawn_on(scheduler.core(), future);
    loop {
        if let Some(output) = handle.try_take() {
            return output.map_err(|err| {
                Error::new(ErrorKind::TaskCancelled)
                    .with_message("root future dropped before completion")
                    .with_source(err)
            });
        }
        scheduler.run_one_turn()?;
    }
}
