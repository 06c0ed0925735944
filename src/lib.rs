//! Pipelab: deterministic virtual-time test harness for async stream pipelines.
//!
//! # Overview
//!
//! Pipelab runs asynchronous pipelines on a single-threaded cooperative
//! scheduler whose clock only moves by jumping to the next pending timer. A
//! test that sleeps for an hour finishes instantly, and every jump is
//! recorded so the test can assert the exact durations its code waited for.
//!
//! # Core Guarantees
//!
//! - **No real delay**: the virtual scheduler never reads the wall clock
//! - **Deterministic order**: timers fire by deadline, ties in registration order
//! - **Hangs are loud**: a loop that spins with nothing runnable and no timer
//!   fails with a stuck-loop error instead of hanging the test
//! - **Leaks are attributed**: probe resources still open at teardown fail
//!   the test that opened them
//! - **Cleanup under cancellation**: a dropped probe still waits its cleanup
//!   delay and always releases
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers and the virtual timestamp
//! - [`runtime`]: Scheduler interface, task core, real-time scheduler
//! - [`lab`]: Virtual clock, timer registry, stuck detector, virtual scheduler
//! - [`time`]: Sleep and timeout primitives
//! - [`stream`]: Stream trait, sources and combinators
//! - [`harness`]: Fixtures, probe operators, assertion strategies
//! - [`config`]: Backend selection and environment overrides
//! - [`error`]: Error types
//! - [`tracing_compat`]: Logging macros with or without `tracing`
//! - [`test_utils`]: Logging setup and test macros

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod harness;
pub mod lab;
pub mod runtime;
pub mod stream;
pub mod test_utils;
pub mod time;
pub mod tracing_compat;
pub mod types;

// Re-exports for convenient access to core types
pub use config::{Backend, ConfigError, HarnessConfig};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use harness::{for_each_strategy, Expected, Fixture, Mismatch, ProbeOperator, Strategy, TestContext};
pub use lab::{LabConfig, ResourceTracker, VirtualScheduler};
pub use runtime::{Scheduler, Steps};
pub use types::{TaskId, Time};
