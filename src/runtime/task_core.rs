//! Turn semantics shared by every scheduler.
//!
//! The task core owns the live tasks and the ready queue. One call to
//! [`TaskCore::poll_next`] is one unit of ready work: it polls the task that
//! was woken first. Schedulers differ only in how time moves between polls.
//!
//! A task's future is taken out of its slot while it is being polled, so a
//! task may spawn, abort, or drop other tasks (whose finalizers may spawn in
//! turn) without re-entering a borrow.

use crate::runtime::stored_task::StoredTask;
use crate::runtime::waker::ReadyQueue;
use crate::tracing_compat::{debug, trace};
use crate::types::TaskId;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug)]
struct TaskSlot {
    /// `None` while the task is being polled.
    task: Option<StoredTask>,
    waker: Waker,
}

/// Live tasks plus the queue of tasks ready to run.
#[derive(Debug, Default)]
pub struct TaskCore {
    slots: RefCell<BTreeMap<TaskId, TaskSlot>>,
    ready: Arc<ReadyQueue>,
    next_id: Cell<u64>,
    closed: Cell<bool>,
    idle_waiters: RefCell<Vec<Waker>>,
}

impl TaskCore {
    /// Creates an empty, open task core.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task and queues it for its first poll.
    ///
    /// Returns `None` once the core is closed; the future is dropped at once
    /// so its finalizers still run.
    pub fn spawn_local<F>(&self, future: F) -> Option<TaskId>
    where
        F: Future<Output = ()> + 'static,
    {
        if self.closed.get() {
            trace!("spawn refused: scheduler closed");
            drop(future);
            return None;
        }
        let id = TaskId::from_raw(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let slot = TaskSlot {
            task: Some(StoredTask::new(future, id)),
            waker: self.ready.waker_for(id),
        };
        self.slots.borrow_mut().insert(id, slot);
        self.ready.push(id);
        trace!(task_id = %id, "task spawned");
        Some(id)
    }

    /// Polls the ready task that was woken first.
    ///
    /// Returns the id of the polled task, or `None` if nothing was runnable.
    pub fn poll_next(&self) -> Option<TaskId> {
        loop {
            let id = self.ready.pop()?;
            let taken = {
                let mut slots = self.slots.borrow_mut();
                slots
                    .get_mut(&id)
                    .and_then(|slot| slot.task.take().map(|task| (task, slot.waker.clone())))
            };
            // Stale wake of a task that already finished or was aborted.
            let Some((mut task, waker)) = taken else {
                continue;
            };

            let mut cx = Context::from_waker(&waker);
            match task.poll(&mut cx) {
                Poll::Ready(()) => {
                    let slot = self.slots.borrow_mut().remove(&id);
                    drop(slot);
                    drop(task);
                    trace!(task_id = %id, "task completed");
                    self.notify_idle();
                }
                Poll::Pending => {
                    let orphan = {
                        let mut slots = self.slots.borrow_mut();
                        match slots.get_mut(&id) {
                            Some(slot) => {
                                slot.task = Some(task);
                                None
                            }
                            // Aborted (or the core closed) while it was running.
                            None => Some(task),
                        }
                    };
                    drop(orphan);
                }
            }
            return Some(id);
        }
    }

    /// Drops a task's future, running its finalizers.
    ///
    /// Returns false if the task had already finished.
    pub fn abort(&self, id: TaskId) -> bool {
        let slot = self.slots.borrow_mut().remove(&id);
        match slot {
            Some(slot) => {
                drop(slot);
                debug!(task_id = %id, "task aborted");
                self.notify_idle();
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` has not finished.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.slots.borrow().contains_key(&id)
    }

    /// Returns the number of tasks that have not finished.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Returns true if some task is waiting to be polled.
    #[must_use]
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Registers a waker to be woken when a task finishes or the scheduler
    /// runs out of work.
    pub fn register_idle_waiter(&self, waker: &Waker) {
        let mut waiters = self.idle_waiters.borrow_mut();
        if !waiters.iter().any(|w| w.will_wake(waker)) {
            waiters.push(waker.clone());
        }
    }

    /// Wakes every idle waiter. Returns how many were woken.
    pub fn notify_idle(&self) -> usize {
        let waiters = std::mem::take(&mut *self.idle_waiters.borrow_mut());
        let count = waiters.len();
        for waker in waiters {
            waker.wake();
        }
        count
    }

    /// Refuses further spawns and drops every remaining task.
    ///
    /// Finalizers that spawn during the drop are refused too, so this
    /// terminates. Idempotent; returns the number of tasks dropped.
    pub fn close(&self) -> usize {
        self.closed.set(true);
        let mut dropped = 0;
        loop {
            let drained = std::mem::take(&mut *self.slots.borrow_mut());
            if drained.is_empty() {
                break;
            }
            dropped += drained.len();
            drop(drained);
        }
        self.ready.clear();
        self.idle_waiters.borrow_mut().clear();
        if dropped > 0 {
            debug!(dropped, "task core closed with live tasks");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn spawn_queues_and_polls_in_fifo_order() {
        let core = TaskCore::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = log.clone();
            core.spawn_local(async move { log.borrow_mut().push(n) });
        }
        assert_eq!(core.live_tasks(), 3);
        while core.poll_next().is_some() {}
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(core.live_tasks(), 0);
    }

    #[test]
    fn pending_task_stays_live_until_woken() {
        let core = TaskCore::new();
        core.spawn_local(std::future::pending::<()>());
        assert!(core.poll_next().is_some());
        assert_eq!(core.live_tasks(), 1);
        assert!(!core.has_ready());
        assert!(core.poll_next().is_none());
    }

    #[test]
    fn abort_drops_future() {
        struct Flag(Rc<Cell<bool>>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let core = TaskCore::new();
        let dropped = Rc::new(Cell::new(false));
        let flag = Flag(dropped.clone());
        let id = core
            .spawn_local(async move {
                let _flag = flag;
                std::future::pending::<()>().await;
            })
            .unwrap();
        core.poll_next();
        assert!(core.abort(id));
        assert!(dropped.get());
        assert!(!core.abort(id));
        assert!(core.poll_next().is_none());
    }

    #[test]
    fn close_is_idempotent_and_refuses_spawns() {
        let core = TaskCore::new();
        core.spawn_local(std::future::pending::<()>());
        assert_eq!(core.close(), 1);
        assert_eq!(core.close(), 0);
        assert!(core.is_closed());
        assert!(core.spawn_local(async {}).is_none());
        assert_eq!(core.live_tasks(), 0);
    }

    #[test]
    fn task_can_spawn_while_polled() {
        let core = Rc::new(TaskCore::new());
        let inner = core.clone();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        core.spawn_local(async move {
            let h2 = h.clone();
            inner.spawn_local(async move { h2.set(h2.get() + 10) });
            h.set(h.get() + 1);
        });
        while core.poll_next().is_some() {}
        assert_eq!(hits.get(), 11);
    }
}
