//! Scoped iteration session.
//!
//! A [`StreamContext`] owns the stream it iterates. The stream is dropped as
//! soon as it ends or fails, and in any case when the context is dropped, so
//! every exit path out of a consuming loop releases it.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Owns a stream for the duration of one iteration session.
///
/// Fused: after the end or the first error it yields `None` forever.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct StreamContext<S> {
    stream: Option<S>,
}

/// Opens an iteration session over `source`.
///
/// ```ignore
/// let mut session = pipelab::stream::scoped(pipeline);
/// while let Some(item) = session.next().await {
///     // ...
/// }
/// // `pipeline` has been dropped here on every path
/// ```
pub fn scoped<S>(source: S) -> StreamContext<S> {
    StreamContext {
        stream: Some(source),
    }
}

impl<S> StreamContext<S> {
    /// Returns true while the underlying stream is still held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Ends the session early, dropping the stream.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl<S: Unpin> Unpin for StreamContext<S> {}

impl<S, T, E> Stream for StreamContext<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(stream).poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(error))) => {
                self.stream = None;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                self.stream = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{iterate, throw, StreamExt};
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn fused_after_error() {
        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let source = iterate::<_, &str>(vec![1]).chain(throw("bad")).chain(iterate(vec![2]));
        let mut session = scoped(source);
        assert_eq!(Pin::new(&mut session).poll_next(&mut cx), Poll::Ready(Some(Ok(1))));
        assert_eq!(
            Pin::new(&mut session).poll_next(&mut cx),
            Poll::Ready(Some(Err("bad")))
        );
        assert!(!session.is_active());
        assert_eq!(Pin::new(&mut session).poll_next(&mut cx), Poll::Ready(None));
    }

    #[test]
    fn close_releases_stream() {
        let mut session = scoped(iterate::<_, ()>(vec![1, 2]));
        assert!(session.is_active());
        session.close();
        assert!(!session.is_active());
    }
}
