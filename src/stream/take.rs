//! Take combinator.
//!
//! Once `n` items have been yielded the upstream is dropped, the way an
//! abandoned async iterator is closed. A probe operator upstream of `take`
//! therefore goes through its cancellation path.

use super::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream for the [`take`](super::StreamExt::take) method.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Take<S> {
    stream: Option<S>,
    remaining: usize,
}

impl<S> Take<S> {
    pub(crate) fn new(stream: S, remaining: usize) -> Self {
        Self {
            stream: (remaining > 0).then_some(stream),
            remaining,
        }
    }
}

impl<S: Unpin> Unpin for Take<S> {}

impl<S: Stream + Unpin> Stream for Take<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(stream).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.stream = None;
                }
                Poll::Ready(Some(item))
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
    use crate::stream::{iterate, StreamExt};
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn take_limits_and_releases_upstream() {
        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let mut stream = iterate::<_, ()>(1..).take(2);
        assert_eq!(Pin::new(&mut stream).poll_next(&mut cx), Poll::Ready(Some(Ok(1))));
        assert_eq!(Pin::new(&mut stream).poll_next(&mut cx), Poll::Ready(Some(Ok(2))));
        assert!(stream.stream.is_none());
        assert_eq!(Pin::new(&mut stream).poll_next(&mut cx), Poll::Ready(None));
    }

    #[test]
    fn take_zero_is_empty() {
        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let mut stream = iterate::<_, ()>(vec![1]).take(0);
        assert_eq!(Pin::new(&mut stream).poll_next(&mut cx), Poll::Ready(None));
    }
}
