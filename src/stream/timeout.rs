//! Per-item timeout combinator.
//!
//! Each item must arrive within `duration` of being requested. When the
//! window passes, the stream yields `Err(E::from(Elapsed))`, drops its
//! upstream and ends.

use super::Stream;
use crate::time::{sleep, Elapsed, Sleep};
use crate::types::Time;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Stream for the [`timeout`](super::StreamExt::timeout) method.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct TimeoutStream<S> {
    stream: Option<S>,
    duration: Duration,
    window: Option<Sleep>,
}

impl<S> TimeoutStream<S> {
    pub(crate) fn new(stream: S, duration: Duration) -> Self {
        Self {
            stream: Some(stream),
            duration,
            window: None,
        }
    }
}

impl<S: Unpin> Unpin for TimeoutStream<S> {}

impl<S, T, E> Stream for TimeoutStream<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    E: From<Elapsed>,
{
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(stream) = this.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(stream).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.window = None;
                return Poll::Ready(Some(item));
            }
            Poll::Ready(None) => {
                this.window = None;
                this.stream = None;
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }
        let duration = this.duration;
        let window = this.window.get_or_insert_with(|| sleep(duration));
        if Pin::new(&mut *window).poll(cx).is_pending() {
            return Poll::Pending;
        }
        let deadline = window.deadline().unwrap_or(Time::ZERO);
        this.window = None;
        this.stream = None;
        Poll::Ready(Some(Err(E::from(Elapsed::new(deadline)))))
    }
}
