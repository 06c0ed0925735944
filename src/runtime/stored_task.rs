//! Stored task type for scheduler-local future storage.
//!
//! `StoredTask` wraps a type-erased future that the task core polls. The
//! output has already been routed to the task's join handle, so every stored
//! future resolves to `()`.

use crate::tracing_compat::trace;
use crate::types::TaskId;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A type-erased future stored in the task core.
pub struct StoredTask {
    future: Pin<Box<dyn Future<Output = ()>>>,
    task_id: TaskId,
    poll_count: u64,
}

impl StoredTask {
    /// Creates a stored task from a future.
    pub fn new<F>(future: F, task_id: TaskId) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self {
            future: Box::pin(future),
            task_id,
            poll_count: 0,
        }
    }

    /// Returns the task id.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.task_id
    }

    /// Polls the stored task.
    pub fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.poll_count += 1;
        let result = self.future.as_mut().poll(cx);
        trace!(
            task_id = %self.task_id,
            poll_number = self.poll_count,
            ready = result.is_ready(),
            "task polled"
        );
        result
    }

    /// Returns the number of times this task has been polled.
    #[must_use]
    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }
}

impl std::fmt::Debug for StoredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTask")
            .field("task_id", &self.task_id)
            .field("poll_count", &self.poll_count)
            .finish_non_exhaustive()
    }
}
