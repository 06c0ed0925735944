//! Core types shared by the scheduler, the timer registry and the harness.
//!
//! - [`id`]: Identifier types (`TaskId`, `TimerId`) and the virtual [`Time`] instant

pub mod id;

pub use id::{TaskId, Time, TimerId};
