//! Aggregate a stream into its last value.

use super::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Why awaiting a stream as one value failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError<E> {
    /// The stream ended without yielding a value.
    #[error("stream ended without producing a value")]
    Empty,
    /// The stream yielded an error.
    #[error("stream failed: {0}")]
    Failed(E),
}

/// Future for the [`last`](super::StreamExt::last) method.
///
/// Resolves to the last value the stream yields; the first error ends the
/// aggregation.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Last<S, T> {
    stream: S,
    last: Option<T>,
}

impl<S, T> Last<S, T> {
    pub(crate) fn new(stream: S) -> Self {
        Self { stream, last: None }
    }
}

impl<S: Unpin, T> Unpin for Last<S, T> {}

impl<S, T, E> Future for Last<S, T>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Output = Result<T, AggregateError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => self.last = Some(value),
                Poll::Ready(Some(Err(error))) => {
                    return Poll::Ready(Err(AggregateError::Failed(error)));
                }
                Poll::Ready(None) => {
                    return Poll::Ready(self.last.take().ok_or(AggregateError::Empty));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
