//! The core Stream trait for asynchronous iteration.
//!
//! # Cancel Safety
//!
//! Dropping a stream mid-iteration is always allowed. Streams that hold
//! resources release them from `Drop`.

use std::ops::DerefMut;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Asynchronous iterator producing a sequence of values.
///
/// `poll_next` returns `Poll::Pending` if the next value is not ready yet,
/// `Poll::Ready(Some(item))` if a value is available, or `Poll::Ready(None)`
/// once the stream has terminated.
///
/// # Examples
///
/// ```ignore
/// use pipelab::stream::{Stream, StreamExt};
///
/// async fn drain<S: Stream<Item = i32> + Unpin>(mut stream: S) {
///     while let Some(item) = stream.next().await {
///         println!("got: {item}");
///     }
/// }
/// ```
pub trait Stream {
    /// The type of values yielded by the stream.
    type Item;

    /// Attempt to pull out the next value of this stream.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>>;
}

impl<P> Stream for Pin<P>
where
    P: DerefMut + Unpin,
    P::Target: Stream + Unpin,
{
    type Item = <P::Target as Stream>::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().as_mut().poll_next(cx)
    }
}

impl<S: Stream + Unpin + ?Sized> Stream for Box<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut **self).poll_next(cx)
    }
}

impl<S: Stream + Unpin + ?Sized> Stream for &mut S {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut **self).poll_next(cx)
    }
}
