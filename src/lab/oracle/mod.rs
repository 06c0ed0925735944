//! Test oracles for verifying harness invariants.
//!
//! Oracles observe events during a test and verify an invariant at teardown.
//!
//! | Invariant | Oracle |
//! |-----------|--------|
//! | Every resource opened by a probe operator is released before teardown | [`ResourceTracker`] |

pub mod resource_leak;

pub use resource_leak::{OpenResource, ResourceLeakViolation, ResourceTracker};
