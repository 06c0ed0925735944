//! Test-facing harness: fixtures, probes and assertion strategies.
//!
//! A typical test runs its body once per strategy on a virtual-time
//! fixture, wires a probe into the pipeline, and lets the fixture check
//! that the probe released its resource:
//!
//! ```ignore
//! use pipelab::harness::{for_each_strategy, Expected};
//! use pipelab::stream::range;
//! use std::time::Duration;
//!
//! for_each_strategy(Default::default(), |strategy, ctx| async move {
//!     let probe = ctx.add_resource(Duration::from_secs(5));
//!     let pipeline = probe.apply(range::<MyError>(0, 3, Duration::from_secs(1)));
//!     strategy.assert(pipeline, &Expected::values([0, 1, 2])).await;
//!     assert_eq!(ctx.steps(), [Duration::from_secs(1), Duration::from_secs(1), Duration::from_secs(5)]);
//! })?;
//! ```

pub mod fixture;
pub mod probe;
pub mod strategy;

pub use fixture::{build_scheduler, for_each_strategy, for_strategies, Fixture, Settle, TestContext};
pub use probe::{Probe, ProbeOperator};
pub use strategy::{assert_aiter, assert_await, compare_errors, Expected, Mismatch, Strategy};
