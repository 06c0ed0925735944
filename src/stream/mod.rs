//! Asynchronous sequences and the stand-in pipeline vocabulary.
//!
//! Pipelines under test are plain [`Stream`]s of `Result<T, E>` items. This
//! module provides the sources and combinators the harness and its tests
//! build them from.
//!
//! # Core Traits
//!
//! - [`Stream`]: The async equivalent of [`Iterator`]
//! - [`StreamExt`]: Extension trait providing combinator methods
//!
//! # Sources
//!
//! - [`iterate`], [`range`], [`empty`], [`throw`], [`never`]
//!
//! # Combinators
//!
//! - [`Chain`]: Yields items from the first stream, then the second
//! - [`Take`]: Yields the first `n` items, then drops the upstream
//! - [`TimeoutStream`]: Fails when an item takes too long to arrive
//! - [`Last`]: Awaits the stream as a single value
//! - [`StreamContext`]: Scoped iteration that releases the stream on every exit
//!
//! # Examples
//!
//! ```ignore
//! use pipelab::stream::{range, StreamExt};
//! use std::time::Duration;
//!
//! let last = range::<MyError>(0, 5, Duration::from_secs(1)).last().await;
//! assert_eq!(last, Ok(4));
//! ```

mod chain;
mod context;
mod iter;
mod last;
mod next;
#[allow(clippy::module_inception)]
mod stream;
mod take;
mod timeout;

pub use chain::Chain;
pub use context::{scoped, StreamContext};
pub use iter::{empty, iterate, never, range, throw, Empty, Iterate, Never, Range, Throw};
pub use last::{AggregateError, Last};
pub use next::Next;
pub use stream::Stream;
pub use take::Take;
pub use timeout::TimeoutStream;

use crate::time::Elapsed;
use std::time::Duration;

/// Extension trait providing combinator methods for streams.
///
/// This trait is automatically implemented for all types that implement [`Stream`].
pub trait StreamExt: Stream {
    /// Returns the next item from the stream.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next::new(self)
    }

    /// Chains this stream with another stream.
    fn chain<S2>(self, other: S2) -> Chain<Self, S2>
    where
        Self: Sized,
        S2: Stream<Item = Self::Item>,
    {
        Chain::new(self, other)
    }

    /// Takes the first `n` items, dropping the upstream afterwards.
    fn take(self, n: usize) -> Take<Self>
    where
        Self: Sized,
    {
        Take::new(self, n)
    }

    /// Fails with [`Elapsed`] when no item arrives within `duration`.
    fn timeout<T, E>(self, duration: Duration) -> TimeoutStream<Self>
    where
        Self: Stream<Item = Result<T, E>> + Sized,
        E: From<Elapsed>,
    {
        TimeoutStream::new(self, duration)
    }

    /// Awaits the stream as one value: its last item, or the first error.
    fn last<T, E>(self) -> Last<Self, T>
    where
        Self: Stream<Item = Result<T, E>> + Sized,
    {
        Last::new(self)
    }
}

impl<S: Stream + ?Sized> StreamExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, VirtualScheduler};
    use crate::runtime::{block_on, enter, Scheduler};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum PipeError {
        Boom,
        Timeout,
    }

    impl From<Elapsed> for PipeError {
        fn from(_: Elapsed) -> Self {
            Self::Timeout
        }
    }

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn lab() -> Rc<VirtualScheduler> {
        Rc::new(VirtualScheduler::new(LabConfig::default()))
    }

    #[test]
    fn last_of_range() {
        init_test("last_of_range");
        let sched = lab();
        let _guard = enter(sched.clone());
        let last = block_on(range::<PipeError>(0, 4, Duration::from_secs(1)).last())
            .expect("run");
        crate::assert_with_log!(last == Ok(3), "last", Ok::<_, ()>(3), last);
        assert_eq!(sched.steps(), [Duration::from_secs(1); 3]);
        crate::test_complete!("last_of_range");
    }

    #[test]
    fn last_of_empty_and_failed() {
        init_test("last_of_empty_and_failed");
        let sched = lab();
        let _guard = enter(sched);
        let empty = block_on(empty::<i64, PipeError>().last()).expect("run");
        assert_eq!(empty, Err(AggregateError::Empty));
        let failed = block_on(
            iterate::<_, PipeError>(vec![1, 2])
                .chain(throw(PipeError::Boom))
                .last(),
        )
        .expect("run");
        assert_eq!(failed, Err(AggregateError::Failed(PipeError::Boom)));
        crate::test_complete!("last_of_empty_and_failed");
    }

    #[test]
    fn timeout_fires_on_slow_item() {
        init_test("timeout_fires_on_slow_item");
        let sched = lab();
        let _guard = enter(sched.clone());
        let items = block_on(async {
            let mut stream = never::<i64, PipeError>().timeout(Duration::from_secs(1));
            let mut seen = Vec::new();
            while let Some(item) = stream.next().await {
                seen.push(item);
            }
            seen
        })
        .expect("run");
        assert_eq!(items, vec![Err(PipeError::Timeout)]);
        assert_eq!(sched.steps(), [Duration::from_secs(1)]);
        assert_eq!(sched.pending_timers(), 0);
        crate::test_complete!("timeout_fires_on_slow_item");
    }

    #[test]
    fn timeout_passes_fast_items() {
        init_test("timeout_passes_fast_items");
        let sched = lab();
        let _guard = enter(sched.clone());
        let last = block_on(
            range::<PipeError>(0, 3, Duration::from_millis(500))
                .timeout(Duration::from_secs(1))
                .last(),
        )
        .expect("run");
        assert_eq!(last, Ok(2));
        assert_eq!(sched.steps(), [Duration::from_millis(500); 2]);
        assert_eq!(sched.pending_timers(), 0);
        crate::test_complete!("timeout_passes_fast_items");
    }

    #[test]
    fn take_then_next() {
        init_test("take_then_next");
        let sched = lab();
        let _guard = enter(sched);
        let got = block_on(async {
            let mut stream = iterate::<_, PipeError>(1..).take(3);
            let mut got = Vec::new();
            while let Some(Ok(v)) = stream.next().await {
                got.push(v);
            }
            got
        })
        .expect("run");
        assert_eq!(got, vec![1, 2, 3]);
        crate::test_complete!("take_then_next");
    }
}
