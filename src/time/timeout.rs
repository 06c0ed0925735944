//! Timeout wrapper for futures.

use super::elapsed::Elapsed;
use super::sleep::{sleep, Sleep};
use crate::types::Time;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Runs `future` until it completes or `duration` passes, whichever comes first.
///
/// The inner future is polled before the deadline is checked, so a future
/// that is ready on the poll where the deadline passes still wins.
pub fn timeout<F: Future>(duration: Duration, future: F) -> Timeout<F> {
    Timeout {
        future: Box::pin(future),
        sleep: sleep(duration),
    }
}

/// Future returned by [`timeout`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Timeout<F> {
    future: Pin<Box<F>>,
    sleep: Sleep,
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output, Elapsed>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Poll::Ready(output) = self.future.as_mut().poll(cx) {
            return Poll::Ready(Ok(output));
        }
        match Pin::new(&mut self.sleep).poll(cx) {
            Poll::Ready(()) => {
                let deadline = self.sleep.deadline().unwrap_or(Time::ZERO);
                Poll::Ready(Err(Elapsed::new(deadline)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
