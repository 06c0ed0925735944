#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use pipelab::config::{Backend, HarnessConfig};
use pipelab::harness::{Fixture, TestContext};
use pipelab::time::Elapsed;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::future::Future;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

pub use pipelab::{assert_with_log, test_complete, test_phase, test_section};

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "PIPELAB_PROPTEST_SEED";
const PROPTEST_MAX_SHRINK_ITERS_ENV: &str = "PIPELAB_PROPTEST_MAX_SHRINK_ITERS";

/// One second of virtual time.
pub const SEC: Duration = Duration::from_secs(1);

/// An empty step list.
pub const NO_STEPS: [Duration; 0] = [];

/// Shorthand for `n` seconds.
#[must_use]
pub const fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Error type produced by the pipelines under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// Stand-in for a value error with a message.
    Value(String),
    /// Stand-in for an argument-less error.
    ZeroDivision,
    /// An item did not arrive in time.
    Timeout,
}

impl PipeError {
    /// Builds a `Value` error.
    pub fn value(msg: &str) -> Self {
        Self::Value(msg.to_owned())
    }
}

impl From<Elapsed> for PipeError {
    fn from(_: Elapsed) -> Self {
        Self::Timeout
    }
}

/// Configuration for property tests with optional deterministic seed support.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Fixed seed for reproducibility (overrides CI default when set).
    pub seed: Option<u64>,
    /// Number of successful cases required.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropertyTestConfig {
    /// Build a config with defaults for property tests.
    #[must_use]
    pub fn new(cases: u32) -> Self {
        Self {
            seed: read_proptest_seed(),
            cases,
            max_shrink_iters: read_max_shrink_iters()
                .unwrap_or(ProptestConfig::default().max_shrink_iters),
        }
    }

    /// Convert into a ProptestConfig, applying deterministic seed rules.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);

        // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
        if matches!(config.rng_seed, RngSeed::Random) {
            if let Some(seed) = self.seed {
                config.rng_seed = RngSeed::Fixed(seed);
            }
        }

        config.max_shrink_iters = self.max_shrink_iters;
        config
    }
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    PropertyTestConfig::new(cases).to_proptest_config()
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

fn read_max_shrink_iters() -> Option<u32> {
    std::env::var(PROPTEST_MAX_SHRINK_ITERS_ENV)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Run `body` on a fresh virtual-time fixture, panicking on fixture errors.
pub fn run_virtual<F, Fut>(body: F) -> Fut::Output
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future + 'static,
    Fut::Output: 'static,
{
    init_test_logging();
    Fixture::new(HarnessConfig::new(Backend::Virtual))
        .expect("virtual fixture")
        .run(body)
        .expect("fixture teardown")
}
