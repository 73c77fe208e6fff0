// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// One execution of the operation within a retried call.
///
/// Attempts are numbered from zero: the initial execution is attempt `0`, the first retry is
/// attempt `1`.
///
/// # Examples
///
/// ```
/// use bulwark::Attempt;
///
/// let attempt = Attempt::new(0, false);
/// assert!(attempt.is_first());
/// assert!(!attempt.is_last());
///
/// let last = Attempt::new(3, true);
/// assert_eq!(last.index(), 3);
/// assert!(last.is_last());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attempt {
    index: u32,
    is_last: bool,
}

impl Attempt {
    /// Creates an attempt.
    #[must_use]
    pub const fn new(index: u32, is_last: bool) -> Self {
        Self { index, is_last }
    }

    /// The 0-based index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns `true` for the initial execution.
    #[must_use]
    pub const fn is_first(self) -> bool {
        self.index == 0
    }

    /// Returns `true` when no retry may follow this attempt.
    #[must_use]
    pub const fn is_last(self) -> bool {
        self.is_last
    }

    /// The next attempt, or `None` when the limit is reached.
    pub(crate) fn next(self, limit: AttemptLimit) -> Option<Self> {
        let index = self.index.checked_add(1)?;

        match limit {
            AttemptLimit::Bounded(total) if index >= total => None,
            AttemptLimit::Bounded(total) => Some(Self::new(index, index + 1 == total)),
            AttemptLimit::Unbounded => Some(Self::new(index, false)),
        }
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.index, f)
    }
}

/// Total number of executions a retry strategy may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptLimit {
    /// The initial execution plus `n - 1` retries.
    Bounded(u32),
    Unbounded,
}

impl AttemptLimit {
    pub(crate) fn from_retries(max_retries: u32) -> Self {
        Self::Bounded(max_retries.saturating_add(1))
    }

    pub(crate) fn first(self) -> Attempt {
        Attempt::new(0, self == Self::Bounded(1))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_sequence() {
        let limit = AttemptLimit::from_retries(2);

        let first = limit.first();
        assert_eq!(first, Attempt::new(0, false));

        let second = first.next(limit).unwrap();
        assert_eq!(second, Attempt::new(1, false));

        let third = second.next(limit).unwrap();
        assert_eq!(third, Attempt::new(2, true));

        assert_eq!(third.next(limit), None);
    }

    #[test]
    fn zero_retries_is_single_shot() {
        let limit = AttemptLimit::from_retries(0);
        let first = limit.first();

        assert!(first.is_last());
        assert_eq!(first.next(limit), None);
    }

    #[test]
    fn unbounded_never_ends() {
        let attempt = Attempt::new(u32::MAX - 1, false);

        assert_eq!(attempt.next(AttemptLimit::Unbounded), Some(Attempt::new(u32::MAX, false)));
        assert_eq!(Attempt::new(u32::MAX, false).next(AttemptLimit::Unbounded), None);
    }

    #[test]
    fn saturating_retry_count() {
        assert_eq!(AttemptLimit::from_retries(u32::MAX), AttemptLimit::Bounded(u32::MAX));
    }

    #[test]
    fn display_shows_index() {
        assert_eq!(Attempt::new(7, false).to_string(), "7");
    }
}
