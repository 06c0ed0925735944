//! Error types for the harness.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Errors raised by the pipeline under test are never wrapped here; they
//!   travel as values to the assertion strategy that compares them
//! - Scheduler-level faults (a stuck loop, a closed scheduler) and teardown
//!   failures (a resource leak) are reported through [`Error`]
//!
//! # Error Categories
//!
//! - **Scheduling**: the run loop cannot make progress, or was closed
//! - **Resources**: a probe operator was still open at teardown
//! - **Tasks**: a spawned task was cancelled before producing its output
//! - **Configuration**: invalid backend name or malformed override

use core::fmt;
use std::sync::Arc;

use crate::config::ConfigError;
use crate::lab::oracle::ResourceLeakViolation;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Scheduling ===
    /// The run loop spun past the stuck threshold with nothing runnable and
    /// no timer to jump to.
    StuckLoop,
    /// The scheduler was closed while work was still requested from it.
    SchedulerClosed,

    // === Resources ===
    /// Probe resources were still open when the fixture tore down.
    ResourceLeak,

    // === Tasks ===
    /// A task was aborted before it completed.
    TaskCancelled,

    // === Configuration ===
    /// The harness configuration is invalid.
    Config,

    // === Internal ===
    /// Internal harness error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns true if this kind should fail the test outright rather than
    /// be compared against an expected outcome.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StuckLoop | Self::ResourceLeak | Self::Config | Self::Internal
        )
    }
}

/// The main error type for harness operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if the run loop was found stuck.
    #[must_use]
    pub const fn is_stuck(&self) -> bool {
        matches!(self.kind, ErrorKind::StuckLoop)
    }

    /// Returns true if this error reports leaked probe resources.
    #[must_use]
    pub const fn is_leak(&self) -> bool {
        matches!(self.kind, ErrorKind::ResourceLeak)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the leak report carried by a [`ErrorKind::ResourceLeak`] error.
    #[must_use]
    pub fn leak(&self) -> Option<&ResourceLeakViolation> {
        self.source
            .as_deref()
            .and_then(|source| source.downcast_ref::<ResourceLeakViolation>())
    }

    /// Creates a stuck-loop error.
    #[must_use]
    pub fn stuck_loop(busy_turns: u64, live_tasks: usize) -> Self {
        Self::new(ErrorKind::StuckLoop).with_message(format!(
            "no progress after {busy_turns} turns: {live_tasks} live task(s), nothing runnable, no pending timer"
        ))
    }

    /// Creates an error for work submitted to a closed scheduler.
    #[must_use]
    pub fn scheduler_closed() -> Self {
        Self::new(ErrorKind::SchedulerClosed).with_message("scheduler already closed")
    }

    /// Creates an internal error (harness bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorKind::Config)
            .with_message(e.to_string())
            .with_source(e)
    }
}

impl From<ResourceLeakViolation> for Error {
    fn from(v: ResourceLeakViolation) -> Self {
        Self::new(ErrorKind::ResourceLeak)
            .with_message(v.to_string())
            .with_source(v)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }
}

/// A specialized Result type for harness operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
