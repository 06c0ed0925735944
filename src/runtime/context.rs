//! The active scheduler for the current thread.
//!
//! Time primitives and `spawn` find their scheduler here rather than taking
//! it as a parameter. A fixture installs its scheduler for the duration of a
//! test with [`enter`]; the returned guard restores whatever was installed
//! before, so nested installations unwind correctly.

use crate::runtime::Scheduler;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Option<Rc<dyn Scheduler>>> = const { RefCell::new(None) };
}

/// Restores the previously active scheduler on drop.
#[derive(Debug)]
#[must_use = "the scheduler is uninstalled when the guard drops"]
pub struct EnterGuard {
    previous: Option<Rc<dyn Scheduler>>,
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let replaced = CURRENT.with(|current| current.replace(previous));
        drop(replaced);
    }
}

/// Installs `scheduler` as the active scheduler of this thread.
pub fn enter(scheduler: Rc<dyn Scheduler>) -> EnterGuard {
    let previous = CURRENT.with(|current| current.replace(Some(scheduler)));
    EnterGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Returns the active scheduler, if one is installed.
#[must_use]
pub fn try_current() -> Option<Rc<dyn Scheduler>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Returns the active scheduler.
///
/// # Panics
///
/// Panics if no scheduler is installed on this thread.
#[must_use]
pub fn current() -> Rc<dyn Scheduler> {
    try_current().unwrap_or_else(|| {
        panic!("no active pipelab scheduler: time and task primitives must run inside a fixture")
    })
}
