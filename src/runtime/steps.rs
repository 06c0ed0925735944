//! Recorded virtual time jumps.

use std::time::Duration;

/// The time jumps a scheduler took, as exposed to tests.
///
/// Wall-clock schedulers never jump, so they report [`Steps::Untracked`],
/// which compares equal to any expected list. A test asserting exact sleep
/// durations therefore passes unchanged on every backend.
#[derive(Debug, Clone)]
pub enum Steps {
    /// Jumps recorded by the virtual scheduler, in order. Every entry is
    /// strictly positive.
    Recorded(Vec<Duration>),
    /// The backend does not record jumps.
    Untracked,
}

impl Steps {
    /// Returns the recorded jumps, or `None` for an untracked backend.
    #[must_use]
    pub fn recorded(&self) -> Option<&[Duration]> {
        match self {
            Self::Recorded(steps) => Some(steps),
            Self::Untracked => None,
        }
    }

    /// Returns true if this matches `expected`.
    #[must_use]
    pub fn matches(&self, expected: &[Duration]) -> bool {
        match self {
            Self::Recorded(steps) => steps.as_slice() == expected,
            Self::Untracked => true,
        }
    }
}

impl PartialEq for Steps {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Recorded(a), Self::Recorded(b)) => a == b,
            _ => true,
        }
    }
}

impl PartialEq<[Duration]> for Steps {
    fn eq(&self, other: &[Duration]) -> bool {
        self.matches(other)
    }
}

impl PartialEq<Vec<Duration>> for Steps {
    fn eq(&self, other: &Vec<Duration>) -> bool {
        self.matches(other)
    }
}

impl<const N: usize> PartialEq<[Duration; N]> for Steps {
    fn eq(&self, other: &[Duration; N]) -> bool {
        self.matches(other)
    }
}
