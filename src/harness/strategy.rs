//! Pipeline-result assertion strategies.
//!
//! Two interchangeable ways to drive a pipeline to completion and compare
//! what it produced against an [`Expected`] outcome:
//!
//! - [`Strategy::Aiter`]: consume the pipeline item by item inside a scoped
//!   iteration session, comparing every item in order
//! - [`Strategy::Await`]: await the pipeline as one aggregate value, which
//!   must equal the last expected value
//!
//! Both strategies agree on the verdict as long as the pipeline's earlier
//! values are right: an aggregate only sees the last value, and a pipeline
//! that fails is judged on its error alone.
//!
//! # Error equality
//!
//! Two errors are equal if they are the same object, or if they compare
//! equal. A derived `PartialEq` on an error enum compares the variant and
//! its fields, which is the "same kind, same arguments" rule.

use crate::stream::{scoped, AggregateError, Stream, StreamExt};
use crate::tracing_compat::{debug, trace};
use std::fmt::{self, Debug};

/// The outcome a pipeline is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected<T, E> {
    /// Values, in order.
    pub values: Vec<T>,
    /// The error that ends the pipeline, if any.
    pub error: Option<E>,
}

impl<T, E> Expected<T, E> {
    /// Expects `values` and a clean end.
    pub fn values(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            values: values.into_iter().collect(),
            error: None,
        }
    }

    /// Expects no value and a clean end.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            values: Vec::new(),
            error: None,
        }
    }

    /// Expects `values`, then `error`.
    pub fn failing(values: impl IntoIterator<Item = T>, error: E) -> Self {
        Self {
            values: values.into_iter().collect(),
            error: Some(error),
        }
    }

    /// Replaces the expected error.
    #[must_use]
    pub fn with_error(mut self, error: E) -> Self {
        self.error = Some(error);
        self
    }
}

/// How an observed pipeline diverged from its expectation.
///
/// Payloads are the `Debug` renderings of the values involved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    /// An item differed from the expected value at the same position.
    #[error("item {index}: expected {expected}, got {actual}")]
    ValueMismatch {
        /// Position of the item.
        index: usize,
        /// Expected value.
        expected: String,
        /// Observed value.
        actual: String,
    },
    /// The pipeline produced more items than expected.
    #[error("unexpected item {index}: {actual}")]
    UnexpectedValue {
        /// Position of the surplus item.
        index: usize,
        /// Observed value.
        actual: String,
    },
    /// The pipeline ended before producing every expected value.
    #[error("pipeline ended after {produced} of {expected} value(s)")]
    MissingValues {
        /// Values produced.
        produced: usize,
        /// Values expected.
        expected: usize,
    },
    /// The pipeline failed with a different error.
    #[error("expected error {expected}, got {actual}")]
    ErrorMismatch {
        /// Expected error.
        expected: String,
        /// Observed error.
        actual: String,
    },
    /// The pipeline failed although no error was expected.
    #[error("unexpected error: {actual}")]
    UnexpectedError {
        /// Observed error.
        actual: String,
    },
    /// The pipeline ended cleanly although an error was expected.
    #[error("expected error {expected}, but the pipeline ended cleanly")]
    MissingError {
        /// Expected error.
        expected: String,
    },
    /// Awaiting the pipeline produced no value, but values were expected.
    #[error("empty result, expected {expected} value(s)")]
    EmptyResult {
        /// Values expected.
        expected: usize,
    },
    /// The aggregate value is not the last expected value.
    #[error("aggregate result: expected {expected}, got {actual}")]
    ResultMismatch {
        /// The last expected value, or `None` when none was expected.
        expected: String,
        /// Observed aggregate.
        actual: String,
    },
}

/// Compares two pipeline errors.
///
/// Identity first, then equality.
pub fn compare_errors<E: PartialEq>(a: &E, b: &E) -> bool {
    std::ptr::eq(a, b) || a == b
}

fn render<V: Debug>(value: &V) -> String {
    format!("{value:?}")
}

fn judge_error<T, E>(expected: &Expected<T, E>, actual: &E) -> Result<(), Mismatch>
where
    E: PartialEq + Debug,
{
    match &expected.error {
        Some(want) if compare_errors(want, actual) => Ok(()),
        Some(want) => Err(Mismatch::ErrorMismatch {
            expected: render(want),
            actual: render(actual),
        }),
        None => Err(Mismatch::UnexpectedError {
            actual: render(actual),
        }),
    }
}

/// Consumes `source` item by item and compares it with `expected`.
///
/// The source is owned by a scoped iteration session and is released on
/// every return path.
pub async fn assert_aiter<S, T, E>(source: S, expected: &Expected<T, E>) -> Result<(), Mismatch>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    T: PartialEq + Debug,
    E: PartialEq + Debug,
{
    let mut session = scoped(source);
    let mut index = 0;
    while let Some(item) = session.next().await {
        match item {
            Ok(value) => {
                let Some(want) = expected.values.get(index) else {
                    return Err(Mismatch::UnexpectedValue {
                        index,
                        actual: render(&value),
                    });
                };
                if *want != value {
                    return Err(Mismatch::ValueMismatch {
                        index,
                        expected: render(want),
                        actual: render(&value),
                    });
                }
                trace!(index, "item matched");
                index += 1;
            }
            Err(error) => return judge_error(expected, &error),
        }
    }
    if index < expected.values.len() {
        return Err(Mismatch::MissingValues {
            produced: index,
            expected: expected.values.len(),
        });
    }
    match &expected.error {
        Some(want) => Err(Mismatch::MissingError {
            expected: render(want),
        }),
        None => Ok(()),
    }
}

/// Awaits `source` as one aggregate value and compares it with `expected`.
pub async fn assert_await<S, T, E>(source: S, expected: &Expected<T, E>) -> Result<(), Mismatch>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    T: PartialEq + Debug,
    E: PartialEq + Debug,
{
    match source.last().await {
        Err(AggregateError::Empty) => {
            if !expected.values.is_empty() {
                return Err(Mismatch::EmptyResult {
                    expected: expected.values.len(),
                });
            }
            match &expected.error {
                Some(want) => Err(Mismatch::MissingError {
                    expected: render(want),
                }),
                None => Ok(()),
            }
        }
        Err(AggregateError::Failed(error)) => judge_error(expected, &error),
        Ok(value) => {
            if let Some(want) = &expected.error {
                return Err(Mismatch::MissingError {
                    expected: render(want),
                });
            }
            match expected.values.last() {
                Some(want) if *want == value => Ok(()),
                want => Err(Mismatch::ResultMismatch {
                    expected: render(&want),
                    actual: render(&value),
                }),
            }
        }
    }
}

/// A way of driving a pipeline to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Item-by-item consumption.
    Aiter,
    /// Single aggregate await.
    Await,
}

impl Strategy {
    /// Every strategy, in the order tests run them.
    pub const ALL: [Self; 2] = [Self::Aiter, Self::Await];

    /// Returns the strategy's short name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aiter => "aiter",
            Self::Await => "await",
        }
    }

    /// Drives `source` and returns the verdict without panicking.
    pub async fn check<S, T, E>(self, source: S, expected: &Expected<T, E>) -> Result<(), Mismatch>
    where
        S: Stream<Item = Result<T, E>> + Unpin,
        T: PartialEq + Debug,
        E: PartialEq + Debug,
    {
        let verdict = match self {
            Self::Aiter => assert_aiter(source, expected).await,
            Self::Await => assert_await(source, expected).await,
        };
        debug!(strategy = self.name(), passed = verdict.is_ok(), "pipeline checked");
        verdict
    }

    /// Drives `source` and panics if it diverges from `expected`.
    ///
    /// # Panics
    ///
    /// Panics with the [`Mismatch`] on a failed comparison.
    pub async fn assert<S, T, E>(self, source: S, expected: &Expected<T, E>)
    where
        S: Stream<Item = Result<T, E>> + Unpin,
        T: PartialEq + Debug,
        E: PartialEq + Debug,
    {
        if let Err(mismatch) = self.check(source, expected).await {
            panic!("{self} strategy: {mismatch}");
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
