//! Waker implementation with deduplication.
//!
//! Every task owns one waker for its whole life. Waking pushes the task id
//! onto the shared ready queue unless it is already queued, so the queue is
//! FIFO in first-wake order and never holds a task twice.
//!
//! Note: This implementation uses safe Rust only (no unsafe).

use crate::types::TaskId;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::task::{Wake, Waker};

#[derive(Debug, Default)]
struct Queue {
    order: VecDeque<TaskId>,
    queued: HashSet<TaskId>,
}

/// Shared FIFO of tasks ready to be polled.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    inner: Mutex<Queue>,
}

impl ReadyQueue {
    /// Creates an empty ready queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the waker for `task`.
    #[must_use]
    pub fn waker_for(self: &Arc<Self>, task: TaskId) -> Waker {
        Waker::from(Arc::new(TaskWaker {
            queue: Arc::clone(self),
            task,
        }))
    }

    /// Queues `task` unless it is already queued.
    pub fn push(&self, task: TaskId) {
        let mut queue = self.inner.lock();
        if queue.queued.insert(task) {
            queue.order.push_back(task);
        }
    }

    /// Takes the task that was woken first.
    pub fn pop(&self) -> Option<TaskId> {
        let mut queue = self.inner.lock();
        let task = queue.order.pop_front()?;
        queue.queued.remove(&task);
        Some(task)
    }

    /// Returns true if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().order.is_empty()
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Forgets every queued task.
    pub fn clear(&self) {
        let mut queue = self.inner.lock();
        queue.order.clear();
        queue.queued.clear();
    }
}

/// A waker for a specific task.
struct TaskWaker {
    queue: Arc<ReadyQueue>,
    task: TaskId,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.queue.push(self.task);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queue.push(self.task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(n: u64) -> TaskId {
        TaskId::new_for_test(n)
    }

    #[test]
    fn wake_and_pop() {
        let queue = Arc::new(ReadyQueue::new());
        let waker = queue.waker_for(task(1));

        waker.wake_by_ref();

        assert_eq!(queue.pop(), Some(task(1)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn dedup_multiple_wakes() {
        let queue = Arc::new(ReadyQueue::new());
        let waker = queue.waker_for(task(1));

        waker.wake_by_ref();
        waker.wake_by_ref();
        waker.clone().wake();

        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn fifo_in_first_wake_order() {
        let queue = Arc::new(ReadyQueue::new());
        let a = queue.waker_for(task(1));
        let b = queue.waker_for(task(2));

        b.wake_by_ref();
        a.wake_by_ref();
        b.wake_by_ref();

        assert_eq!(queue.pop(), Some(task(2)));
        assert_eq!(queue.pop(), Some(task(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_after_pop() {
        let queue = Arc::new(ReadyQueue::new());
        let waker = queue.waker_for(task(3));
        waker.wake_by_ref();
        assert_eq!(queue.pop(), Some(task(3)));
        waker.wake_by_ref();
        assert_eq!(queue.pop(), Some(task(3)));
    }
}
