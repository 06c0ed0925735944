//! Virtual-time scheduling for deterministic tests.
//!
//! The lab provides:
//!
//! - A virtual clock that moves only by jumping to the next timer
//! - A timer registry ordered by deadline, FIFO among equal deadlines
//! - A stuck detector that tells runnable work from an idle-forever loop
//! - Test oracles for invariant verification (resource leaks)

pub mod clock;
pub mod config;
pub mod oracle;
pub mod runtime;
pub mod stuck;
pub mod timer_registry;

pub use clock::VirtualClock;
pub use config::LabConfig;
pub use oracle::{OpenResource, ResourceLeakViolation, ResourceTracker};
pub use runtime::VirtualScheduler;
pub use stuck::StuckDetector;
pub use timer_registry::{TimerHandle, TimerRegistry};
