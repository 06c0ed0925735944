//! Source streams.
//!
//! Every source yields `Result<T, E>` items so that it plugs straight into a
//! pipeline under test:
//!
//! - [`iterate`]: the items of an iterator, without suspending
//! - [`range`]: integers, sleeping `interval` between consecutive items
//! - [`empty`]: ends at once
//! - [`throw`]: fails at once
//! - [`never`]: stays pending forever without registering a timer

use super::Stream;
use crate::time::{sleep, Sleep};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// A stream that yields the items of an iterator.
///
/// Created by the [`iterate`] function.
pub struct Iterate<I, E> {
    iter: I,
    _error: PhantomData<fn() -> E>,
}

impl<I: fmt::Debug, E> fmt::Debug for Iterate<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iterate").field("iter", &self.iter).finish()
    }
}

impl<I, E> Unpin for Iterate<I, E> {}

impl<I: Iterator, E> Stream for Iterate<I, E> {
    type Item = Result<I::Item, E>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.iter.next().map(Ok))
    }
}

/// Converts an iterator into a stream of `Ok` items.
///
/// # Examples
///
/// ```ignore
/// let xs = pipelab::stream::iterate::<_, MyError>(vec![1, 2, 3]);
/// ```
pub fn iterate<I, E>(items: I) -> Iterate<I::IntoIter, E>
where
    I: IntoIterator,
{
    Iterate {
        iter: items.into_iter(),
        _error: PhantomData,
    }
}

/// A stream of integers with a pause between items.
///
/// Created by the [`range`] function.
pub struct Range<E> {
    next: i64,
    stop: i64,
    interval: Duration,
    pause: Option<Sleep>,
    started: bool,
    _error: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for Range<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range")
            .field("next", &self.next)
            .field("stop", &self.stop)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl<E> Unpin for Range<E> {}

impl<E> Stream for Range<E> {
    type Item = Result<i64, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.next >= self.stop {
            return Poll::Ready(None);
        }
        if self.started && !self.interval.is_zero() {
            let interval = self.interval;
            let pause = self.pause.get_or_insert_with(|| sleep(interval));
            if Pin::new(pause).poll(cx).is_pending() {
                return Poll::Pending;
            }
            self.pause = None;
        }
        self.started = true;
        let item = self.next;
        self.next += 1;
        Poll::Ready(Some(Ok(item)))
    }
}

/// Yields `start..stop`, sleeping `interval` before every item but the first.
pub fn range<E>(start: i64, stop: i64, interval: Duration) -> Range<E> {
    Range {
        next: start,
        stop,
        interval,
        pause: None,
        started: false,
        _error: PhantomData,
    }
}

/// A stream that ends immediately.
pub struct Empty<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> fmt::Debug for Empty<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Empty")
    }
}

impl<T, E> Unpin for Empty<T, E> {}

impl<T, E> Stream for Empty<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(None)
    }
}

/// Creates a stream with no items.
pub fn empty<T, E>() -> Empty<T, E> {
    Empty {
        _marker: PhantomData,
    }
}

/// A stream that fails with one error.
pub struct Throw<T, E> {
    error: Option<E>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, E: fmt::Debug> fmt::Debug for Throw<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throw").field("error", &self.error).finish()
    }
}

impl<T, E> Unpin for Throw<T, E> {}

impl<T, E> Stream for Throw<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.error.take().map(Err))
    }
}

/// Creates a stream that yields `error` and ends.
pub fn throw<T, E>(error: E) -> Throw<T, E> {
    Throw {
        error: Some(error),
        _marker: PhantomData,
    }
}

/// A stream that never yields and never wakes.
pub struct Never<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> fmt::Debug for Never<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Never")
    }
}

impl<T, E> Unpin for Never<T, E> {}

impl<T, E> Stream for Never<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Pending
    }
}

/// Creates a stream that stays pending forever.
pub fn never<T, E>() -> Never<T, E> {
    Never {
        _marker: PhantomData,
    }
}
