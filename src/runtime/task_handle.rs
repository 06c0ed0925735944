//! JoinHandle for awaiting spawned task results.
//!
//! `JoinHandle<T>` is returned by [`spawn`](crate::runtime::spawn) and lets the
//! spawner await the task's output. Dropping the handle detaches the task; it
//! keeps running until it finishes or the scheduler closes.

use crate::runtime::task_core::TaskCore;
use crate::types::TaskId;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Error returned when joining a spawned task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// The task's future was dropped before it completed.
    #[error("task was cancelled before completion")]
    Cancelled,
    /// The scheduler was already closed when the task was spawned.
    #[error("task was refused: scheduler closed")]
    Refused,
}

#[derive(Debug)]
struct JoinState<T> {
    output: Option<Result<T, JoinError>>,
    finished: bool,
    waker: Option<Waker>,
}

/// Writes the task's outcome into its join state.
///
/// Dropped without [`complete`](Self::complete) means the task was cancelled.
pub(crate) struct Completion<T> {
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> Completion<T> {
    pub(crate) fn complete(self, value: T) {
        self.finish(Ok(value));
    }

    fn finish(&self, result: Result<T, JoinError>) {
        let waker = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return;
            }
            state.finished = true;
            state.output = Some(result);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.finish(Err(JoinError::Cancelled));
    }
}

/// A handle to a spawned task that can be used to await its result.
///
/// # Example
///
/// ```ignore
/// let handle = pipelab::runtime::spawn(async { 42 });
/// assert_eq!(handle.await, Ok(42));
/// ```
#[derive(Debug)]
pub struct JoinHandle<T> {
    task_id: Option<TaskId>,
    state: Rc<RefCell<JoinState<T>>>,
    core: Weak<TaskCore>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn pair(core: &Rc<TaskCore>) -> (Self, Completion<T>) {
        let state = Rc::new(RefCell::new(JoinState {
            output: None,
            finished: false,
            waker: None,
        }));
        let handle = Self {
            task_id: None,
            state: Rc::clone(&state),
            core: Rc::downgrade(core),
        };
        (handle, Completion { state })
    }

    pub(crate) fn bind(&mut self, task_id: Option<TaskId>) {
        self.task_id = task_id;
        if task_id.is_none() {
            let mut state = self.state.borrow_mut();
            state.finished = true;
            state.output = Some(Err(JoinError::Refused));
        }
    }

    /// Returns the task ID, or `None` if the spawn was refused.
    #[must_use]
    pub fn id(&self) -> Option<TaskId> {
        self.task_id
    }

    /// Returns true once the task has finished, by completing or being cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// Cancels the task by dropping its future.
    ///
    /// Every finalizer held by the future runs before `abort` returns. A task
    /// that already finished is unaffected.
    pub fn abort(&self) {
        if let (Some(id), Some(core)) = (self.task_id, self.core.upgrade()) {
            core.abort(id);
        }
    }

    /// Takes the output if the task has finished.
    pub fn try_take(&mut self) -> Option<Result<T, JoinError>> {
        self.state.borrow_mut().output.take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if let Some(output) = state.output.take() {
            return Poll::Ready(output);
        }
        assert!(!state.finished, "JoinHandle polled after completion");
        match &state.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => state.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}
