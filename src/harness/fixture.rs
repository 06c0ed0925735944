//! Per-test fixture: scheduler installation, resource tracking, teardown.
//!
//! A [`Fixture`] owns one scheduler and one [`ResourceTracker`] for the
//! duration of one test. [`Fixture::run`] installs the scheduler, runs the
//! body to completion, and then, whatever the body did:
//!
//! 1. drains leftover tasks (detached probe cleanups),
//! 2. checks that every tracked resource was released,
//! 3. resets the tracker,
//! 4. closes the scheduler.
//!
//! Checking before resetting ties a leak to the test that caused it.

use crate::config::{Backend, HarnessConfig};
use crate::error::{Error, Result};
use crate::harness::probe::ProbeOperator;
use crate::harness::strategy::Strategy;
use crate::lab::oracle::ResourceTracker;
use crate::lab::VirtualScheduler;
use crate::runtime::{block_on, enter, spawn_on, JoinHandle, Scheduler, Steps, WallScheduler};
use crate::tracing_compat::{error, info, info_span};
use crate::types::Time;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Builds the scheduler for `config.backend`.
#[must_use]
pub fn build_scheduler(config: &HarnessConfig) -> Rc<dyn Scheduler> {
    let threshold = config.lab.stuck_threshold;
    match config.backend {
        Backend::Virtual => Rc::new(VirtualScheduler::new(config.lab)),
        Backend::Realtime => Rc::new(WallScheduler::realtime(threshold)),
        Backend::Accelerated => Rc::new(WallScheduler::accelerated(config.clock_rate, threshold)),
    }
}

/// One test's scheduler and resource tracker.
#[derive(Debug)]
pub struct Fixture {
    config: HarnessConfig,
    scheduler: Rc<dyn Scheduler>,
    tracker: ResourceTracker,
}

impl Fixture {
    /// Creates a fixture for `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: build_scheduler(&config),
            config,
            tracker: ResourceTracker::new(),
        })
    }

    /// Creates a fixture from environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an override does not parse.
    pub fn from_env() -> Result<Self> {
        Self::new(HarnessConfig::from_env()?)
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns a handle for the test body.
    #[must_use]
    pub fn context(&self) -> TestContext {
        TestContext {
            scheduler: Rc::clone(&self.scheduler),
            tracker: self.tracker.clone(),
        }
    }

    /// Runs `body` under this fixture and tears down.
    ///
    /// # Errors
    ///
    /// Returns the body's scheduling error (a stuck loop) if it had one, or
    /// an [`ErrorKind::ResourceLeak`](crate::error::ErrorKind::ResourceLeak)
    /// error if the body succeeded but left resources open.
    ///
    /// # Panics
    ///
    /// A panic in the body is resumed after teardown.
    pub fn run<F, Fut>(self, body: F) -> Result<Fut::Output>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        let backend = self.config.backend;
        let span = info_span!("fixture", backend = %backend);
        let _span = span.enter();
        info!("fixture installed");

        let guard = enter(Rc::clone(&self.scheduler));
        let ctx = self.context();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| block_on(body(ctx))));

        self.scheduler.run_until_idle(self.config.lab.max_drain_turns);
        let leak = self.tracker.check();
        if let Err(violation) = &leak {
            error!(
                open = violation.open,
                opened_total = violation.opened_total,
                labels = ?violation.labels,
                "resource leak at teardown"
            );
        }
        self.tracker.reset();
        self.scheduler.close();
        drop(guard);
        info!(leaked = leak.is_err(), "fixture closed");

        match outcome {
            Err(payload) => panic::resume_unwind(payload),
            Ok(Err(err)) => Err(err),
            Ok(Ok(value)) => {
                leak?;
                Ok(value)
            }
        }
    }
}

/// The fixture as seen from inside a test body.
#[derive(Debug, Clone)]
pub struct TestContext {
    scheduler: Rc<dyn Scheduler>,
    tracker: ResourceTracker,
}

impl TestContext {
    /// Returns the backend in use.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.scheduler.backend()
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    /// Returns the current time on the scheduler clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.scheduler.now()
    }

    /// Returns the time jumps taken since the last clear.
    #[must_use]
    pub fn steps(&self) -> Steps {
        self.scheduler.steps()
    }

    /// Forgets the recorded time jumps.
    pub fn clear_steps(&self) {
        self.scheduler.clear_steps();
    }

    /// Returns the tracker shared by this test's probes.
    #[must_use]
    pub const fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Returns the number of resources currently open.
    #[must_use]
    pub fn open_resources(&self) -> usize {
        self.tracker.open_now()
    }

    /// Returns the number of resources opened since the last clear.
    #[must_use]
    pub fn resources(&self) -> usize {
        self.tracker.opened_total()
    }

    /// Returns a probe factory with the given cleanup delay.
    #[must_use]
    pub fn add_resource(&self, cleanup: Duration) -> ProbeOperator {
        ProbeOperator::new(self.tracker.clone(), cleanup)
    }

    /// Spawns a task on this test's scheduler.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        spawn_on(self.scheduler.core(), future)
    }

    /// Waits until every open resource is released, or until nothing left
    /// could release one.
    pub fn settle(&self) -> Settle {
        Settle {
            scheduler: Rc::clone(&self.scheduler),
            tracker: self.tracker.clone(),
        }
    }

    /// Runs `body` in a clean scope and checks it released its resources.
    ///
    /// Steps and tracker counters are cleared before the body runs and
    /// again after the check, so assertions on [`steps`](Self::steps)
    /// inside the body only see the body's own jumps.
    ///
    /// # Panics
    ///
    /// Panics if resources are still open once nothing can release them.
    pub async fn assert_cleanup<F: Future>(&self, body: F) -> F::Output {
        self.clear();
        let output = body.await;
        self.settle().await;
        if let Err(violation) = self.tracker.check() {
            error!(open = violation.open, labels = ?violation.labels, "scope leaked resources");
            panic!("{violation}");
        }
        self.clear();
        output
    }

    fn clear(&self) {
        self.scheduler.clear_steps();
        self.tracker.reset();
    }
}

/// Future returned by [`TestContext::settle`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Settle {
    scheduler: Rc<dyn Scheduler>,
    tracker: ResourceTracker,
}

impl Future for Settle {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let core = self.scheduler.core();
        let quiet = !core.has_ready() && !self.scheduler.has_pending_timers();
        if self.tracker.open_now() == 0 || core.live_tasks() <= 1 || quiet {
            return Poll::Ready(());
        }
        core.register_idle_waiter(cx.waker());
        Poll::Pending
    }
}

/// Runs `body` once per strategy, each on a fresh fixture.
///
/// # Errors
///
/// Returns the first fixture error (configuration, stuck loop, leak).
pub fn for_each_strategy<F, Fut>(config: HarnessConfig, body: F) -> Result<()>
where
    F: Fn(Strategy, TestContext) -> Fut,
    Fut: Future<Output = ()> + 'static,
{
    for_strategies(&Strategy::ALL, config, body)
}

/// Runs `body` once per listed strategy, each on a fresh fixture.
///
/// # Errors
///
/// Returns the first fixture error (configuration, stuck loop, leak).
pub fn for_strategies<F, Fut>(strategies: &[Strategy], config: HarnessConfig, body: F) -> Result<()>
where
    F: Fn(Strategy, TestContext) -> Fut,
    Fut: Future<Output = ()> + 'static,
{
    for &strategy in strategies {
        let span = info_span!("strategy", strategy = strategy.name());
        let _span = span.enter();
        Fixture::new(config)?
            .run(|ctx| body(strategy, ctx))
            .map_err(|err: Error| {
                error!(strategy = strategy.name(), error = %err, "strategy run failed");
                err
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::harness::strategy::Expected;
    use crate::lab::LabConfig;
    use crate::stream::{iterate, never, StreamExt};
    use crate::time::sleep;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn virtual_fixture() -> Fixture {
        Fixture::new(HarnessConfig::new(Backend::Virtual)).expect("fixture")
    }

    #[test]
    fn run_returns_body_output() {
        init_test("run_returns_body_output");
        let out = virtual_fixture()
            .run(|ctx| async move {
                sleep(Duration::from_secs(3)).await;
                (ctx.now(), ctx.steps())
            })
            .expect("run");
        assert_eq!(out.0, Time::from_secs(3));
        assert_eq!(out.1, [Duration::from_secs(3)]);
        crate::test_complete!("run_returns_body_output");
    }

    #[test]
    fn leak_is_reported_after_success() {
        init_test("leak_is_reported_after_success");
        let err = virtual_fixture()
            .run(|ctx| async move {
                std::mem::forget(ctx.tracker().acquire(Some("forgotten")));
            })
            .expect_err("leak");
        assert_eq!(err.kind(), ErrorKind::ResourceLeak);
        let violation = err.leak().expect("violation");
        assert_eq!(violation.labels, vec!["forgotten".to_string()]);
        crate::test_complete!("leak_is_reported_after_success");
    }

    #[test]
    fn detached_cleanup_is_drained_before_check() {
        init_test("detached_cleanup_is_drained_before_check");
        virtual_fixture()
            .run(|ctx| async move {
                let probe = ctx.add_resource(Duration::from_secs(2));
                let mut stream = probe.apply(iterate::<_, ()>(1..)).take(1);
                let _ = stream.next().await;
            })
            .expect("cleanup drained");
        crate::test_complete!("detached_cleanup_is_drained_before_check");
    }

    #[test]
    fn stuck_body_still_tears_down() {
        init_test("stuck_body_still_tears_down");
        let tracker = std::cell::RefCell::new(None);
        let err = virtual_fixture()
            .run(|ctx| {
                *tracker.borrow_mut() = Some(ctx.tracker().clone());
                async move {
                    let _ = never::<i64, ()>().next().await;
                }
            })
            .expect_err("stuck");
        assert!(err.is_stuck());
        let tracker = tracker.into_inner().expect("tracker");
        assert_eq!(tracker.opened_total(), 0);
        crate::test_complete!("stuck_body_still_tears_down");
    }

    #[test]
    fn panic_is_resumed_after_teardown() {
        let result = std::panic::catch_unwind(|| {
            virtual_fixture().run(|_ctx| async move {
                panic!("body failed");
            })
        });
        assert!(result.is_err());
    }

    #[test]
    fn assert_cleanup_scopes_steps() {
        init_test("assert_cleanup_scopes_steps");
        virtual_fixture()
            .run(|ctx| async move {
                sleep(Duration::from_secs(1)).await;
                let inner = ctx.clone();
                let steps = ctx
                    .assert_cleanup(async move {
                        let probe = inner.add_resource(Duration::from_secs(5));
                        let stream = probe.apply(iterate::<_, ()>(vec![1, 2]));
                        Strategy::Aiter.assert(stream, &Expected::values([1, 2])).await;
                        assert_eq!(inner.resources(), 1);
                        inner.steps()
                    })
                    .await;
                assert_eq!(steps, [Duration::from_secs(5)]);
                assert_eq!(ctx.open_resources(), 0);
                assert_eq!(ctx.resources(), 0);
            })
            .expect("run");
        crate::test_complete!("assert_cleanup_scopes_steps");
    }

    #[test]
    fn assert_cleanup_waits_for_cancelled_probe() {
        init_test("assert_cleanup_waits_for_cancelled_probe");
        virtual_fixture()
            .run(|ctx| async move {
                let inner = ctx.clone();
                ctx.assert_cleanup(async move {
                    let probe = inner.add_resource(Duration::from_secs(4));
                    let stream = probe.apply(iterate::<_, ()>(0..)).take(3);
                    Strategy::Await.assert(stream, &Expected::values([0, 1, 2])).await;
                    assert_eq!(inner.open_resources(), 1);
                })
                .await;
            })
            .expect("run");
        crate::test_complete!("assert_cleanup_waits_for_cancelled_probe");
    }

    #[test]
    #[should_panic(expected = "still open")]
    fn assert_cleanup_panics_on_leak() {
        let _ = virtual_fixture().run(|ctx| async move {
            let inner = ctx.clone();
            ctx.assert_cleanup(async move {
                std::mem::forget(inner.tracker().acquire(None));
            })
            .await;
        });
    }

    #[test]
    fn for_each_strategy_runs_every_strategy() {
        init_test("for_each_strategy_runs_every_strategy");
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let record = Rc::clone(&seen);
        for_each_strategy(HarnessConfig::default(), move |strategy, _ctx| {
            record.borrow_mut().push(strategy);
            async {}
        })
        .expect("run");
        assert_eq!(*seen.borrow(), Strategy::ALL.to_vec());
        crate::test_complete!("for_each_strategy_runs_every_strategy");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = HarnessConfig {
            lab: LabConfig::new().max_drain_turns(0),
            ..HarnessConfig::default()
        };
        let err = Fixture::new(config).expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn builds_scheduler_per_backend() {
        for backend in Backend::ALL {
            let sched = build_scheduler(&HarnessConfig::new(backend));
            assert_eq!(sched.backend(), backend);
        }
    }
}
