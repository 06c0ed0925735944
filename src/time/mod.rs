//! Time primitives: sleep and timeout operations.
//!
//! - [`Sleep`]: a future that completes at a deadline
//! - [`Timeout`]: a wrapper that bounds any future by a duration
//!
//! # Virtual vs Wall Time
//!
//! These primitives read the clock of the scheduler installed on the
//! current thread. Under the virtual scheduler a sleep never blocks: it
//! registers a timer and the scheduler jumps the clock to it once nothing
//! else is runnable.
//!
//! # Example
//!
//! ```ignore
//! use pipelab::time::{sleep, timeout};
//! use std::time::Duration;
//!
//! sleep(Duration::from_secs(5)).await;
//!
//! match timeout(Duration::from_secs(1), slow_operation()).await {
//!     Ok(result) => println!("completed: {result}"),
//!     Err(elapsed) => println!("{elapsed}"),
//! }
//! ```

mod elapsed;
mod sleep;
mod timeout;

pub use elapsed::Elapsed;
pub use sleep::{sleep, sleep_until, Sleep};
pub use timeout::{timeout, Timeout};
