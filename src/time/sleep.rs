//! Sleep future for timed suspension.
//!
//! A [`Sleep`] asks the active scheduler for the time, registers one timer
//! on its first pending poll and cancels that timer when dropped. Under the
//! virtual scheduler this is what drives time jumps.

use crate::runtime::{context, Scheduler};
use crate::types::{Time, TimerId};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Target {
    /// Resolved against the scheduler clock at the first poll.
    After(Duration),
    At(Time),
}

#[derive(Debug)]
struct Registration {
    scheduler: Rc<dyn Scheduler>,
    timer: TimerId,
    waker: Waker,
}

/// A future that completes at a deadline on the active scheduler's clock.
///
/// `Sleep` is `Unpin` and can be polled through `Pin::new`.
///
/// # Panics
///
/// Polling a `Sleep` with no active scheduler panics.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    target: Target,
    registration: Option<Registration>,
    completed: bool,
}

/// Sleeps for `duration`, measured from the first poll.
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        target: Target::After(duration),
        registration: None,
        completed: false,
    }
}

/// Sleeps until `deadline`.
pub fn sleep_until(deadline: Time) -> Sleep {
    Sleep {
        target: Target::At(deadline),
        registration: None,
        completed: false,
    }
}

impl Sleep {
    /// Returns the deadline, if it has been resolved.
    #[must_use]
    pub fn deadline(&self) -> Option<Time> {
        match self.target {
            Target::At(deadline) => Some(deadline),
            Target::After(_) => None,
        }
    }

    /// Returns true once the deadline has been reached.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        self.completed
    }

    /// Returns the deadline, resolving a relative sleep against `scheduler`.
    fn resolve(&mut self, scheduler: &dyn Scheduler) -> Time {
        match self.target {
            Target::At(deadline) => deadline,
            Target::After(duration) => {
                let deadline = scheduler.now().saturating_add(duration);
                self.target = Target::At(deadline);
                deadline
            }
        }
    }

    fn cancel(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.scheduler.cancel_timer(registration.timer);
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.completed {
            return Poll::Ready(());
        }
        let scheduler = match &self.registration {
            Some(registration) => Rc::clone(&registration.scheduler),
            None => context::current(),
        };
        let deadline = self.resolve(&*scheduler);
        if scheduler.now() >= deadline {
            self.cancel();
            self.completed = true;
            return Poll::Ready(());
        }
        let stale = match &self.registration {
            Some(registration) => !registration.waker.will_wake(cx.waker()),
            None => true,
        };
        if stale {
            self.cancel();
            let timer = scheduler.register_timer(deadline, cx.waker().clone());
            self.registration = Some(Registration {
                scheduler,
                timer,
                waker: cx.waker().clone(),
            });
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, VirtualScheduler};
    use crate::runtime;

    #[test]
    fn relative_sleep_resolves_at_first_poll() {
        let scheduler = Rc::new(VirtualScheduler::new(LabConfig::default()));
        let _guard = context::enter(scheduler.clone());
        runtime::block_on(async {
            let pending = sleep(Duration::from_secs(2));
            assert_eq!(pending.deadline(), None);
            sleep(Duration::from_secs(3)).await;
            pending.await;
        })
        .unwrap();
        assert_eq!(scheduler.now(), Time::from_secs(5));
        assert_eq!(
            scheduler.steps(),
            [Duration::from_secs(3), Duration::from_secs(2)]
        );
    }

    #[test]
    fn past_deadline_completes_without_registering() {
        let scheduler = Rc::new(VirtualScheduler::new(LabConfig::default()));
        let _guard = context::enter(scheduler.clone());
        runtime::block_on(async {
            sleep(Duration::from_secs(4)).await;
            sleep_until(Time::from_secs(1)).await;
        })
        .unwrap();
        assert_eq!(scheduler.steps(), [Duration::from_secs(4)]);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    fn drop_cancels_timer() {
        let scheduler = Rc::new(VirtualScheduler::new(LabConfig::default()));
        let _guard = context::enter(scheduler.clone());
        let handle = runtime::spawn(sleep(Duration::from_secs(9)));
        scheduler.core().poll_next();
        assert_eq!(scheduler.pending_timers(), 1);
        handle.abort();
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    #[should_panic(expected = "no active pipelab scheduler")]
    fn polling_outside_scheduler_panics() {
        let waker = Waker::from(std::sync::Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let mut sleep = sleep(Duration::from_secs(1));
        let _ = Pin::new(&mut sleep).poll(&mut cx);
    }

    struct NoopWaker;

    impl std::task::Wake for NoopWaker {
        fn wake(self: std::sync::Arc<Self>) {}
    }
}
