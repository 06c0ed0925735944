//! Probe operators: pass-through stages that hold a tracked resource.
//!
//! A probe opens one resource on the shared [`ResourceTracker`] when it is
//! first polled, forwards every upstream item unchanged, and on the way out
//! waits `cleanup_time` on the scheduler clock before releasing it.
//!
//! # Exit paths
//!
//! | Exit | Cleanup |
//! |------|---------|
//! | Upstream ends | in-stream wait, then release, then end |
//! | Upstream fails | in-stream wait, then release, then the error |
//! | Probe dropped (cancellation) | wait moved to a detached task |
//!
//! The release itself is the [`OpenResource`] guard's drop, so it runs even
//! when the detached cleanup task is cancelled in turn.

use crate::lab::oracle::{OpenResource, ResourceTracker};
use crate::runtime::{spawn_on, try_current};
use crate::stream::Stream;
use crate::time::{sleep, Sleep};
use crate::tracing_compat::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Factory for probe stages sharing one tracker and cleanup delay.
#[derive(Debug, Clone)]
pub struct ProbeOperator {
    tracker: ResourceTracker,
    cleanup: Duration,
    label: Option<String>,
}

impl ProbeOperator {
    /// Creates a factory for probes that take `cleanup` to release.
    #[must_use]
    pub fn new(tracker: ResourceTracker, cleanup: Duration) -> Self {
        Self {
            tracker,
            cleanup,
            label: None,
        }
    }

    /// Names the resources this factory's probes open.
    #[must_use]
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the cleanup delay.
    #[must_use]
    pub const fn cleanup_time(&self) -> Duration {
        self.cleanup
    }

    /// Wraps `source` in a probe stage.
    pub fn apply<S, T, E>(&self, source: S) -> Probe<S, E>
    where
        S: Stream<Item = Result<T, E>> + Unpin,
    {
        Probe {
            source: Some(source),
            tracker: self.tracker.clone(),
            cleanup: self.cleanup,
            label: self.label.clone(),
            state: ProbeState::Idle,
        }
    }
}

#[derive(Debug)]
enum ProbeState<E> {
    Idle,
    Active(OpenResource),
    Cleanup {
        guard: OpenResource,
        pause: Sleep,
        pending: Option<E>,
    },
    Done,
}

/// A probe stage wrapping a source stream.
///
/// Created by [`ProbeOperator::apply`].
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Probe<S, E> {
    source: Option<S>,
    tracker: ResourceTracker,
    cleanup: Duration,
    label: Option<String>,
    state: ProbeState<E>,
}

impl<S, E> Probe<S, E> {
    /// Returns true while the probe holds its resource.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            ProbeState::Active(_) | ProbeState::Cleanup { .. }
        )
    }

    fn begin_cleanup(&mut self, pending: Option<E>) {
        self.source = None;
        if let ProbeState::Active(guard) = std::mem::replace(&mut self.state, ProbeState::Done) {
            self.state = ProbeState::Cleanup {
                guard,
                pause: sleep(self.cleanup),
                pending,
            };
        }
    }
}

impl<S: Unpin, E> Unpin for Probe<S, E> {}

impl<S, T, E> Stream for Probe<S, E>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match &mut this.state {
                ProbeState::Idle => {
                    let guard = this.tracker.acquire(this.label.as_deref());
                    this.state = ProbeState::Active(guard);
                }
                ProbeState::Active(_) => {
                    let Some(source) = this.source.as_mut() else {
                        this.begin_cleanup(None);
                        continue;
                    };
                    match Pin::new(source).poll_next(cx) {
                        Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(Ok(item))),
                        Poll::Ready(Some(Err(error))) => this.begin_cleanup(Some(error)),
                        Poll::Ready(None) => this.begin_cleanup(None),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                ProbeState::Cleanup { pause, .. } => {
                    if Pin::new(pause).poll(cx).is_pending() {
                        return Poll::Pending;
                    }
                    let ProbeState::Cleanup { guard, pending, .. } =
                        std::mem::replace(&mut this.state, ProbeState::Done)
                    else {
                        continue;
                    };
                    guard.release();
                    return Poll::Ready(pending.map(Err));
                }
                ProbeState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl<S, E> Drop for Probe<S, E> {
    fn drop(&mut self) {
        self.source = None;
        let (guard, pause) = match std::mem::replace(&mut self.state, ProbeState::Done) {
            ProbeState::Active(guard) => (guard, sleep(self.cleanup)),
            ProbeState::Cleanup { guard, pause, .. } => (guard, pause),
            ProbeState::Idle | ProbeState::Done => return,
        };
        match try_current() {
            Some(scheduler) if !scheduler.is_closed() => {
                debug!(cleanup_ms = self.cleanup.as_millis(), "probe cancelled, cleanup detached");
                drop(spawn_on(scheduler.core(), async move {
                    pause.await;
                    guard.release();
                }));
            }
            _ => {
                warn!("probe dropped with no active scheduler, releasing without cleanup wait");
                drop(pause);
                drop(guard);
            }
        }
    }
}
