// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::error::Error;
use std::fmt::Display;
use std::time::Duration;

use recoverable::{Recovery, RecoveryInfo};

/// Type-erased application error carried by [`Fault::Application`].
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The result of running an operation through a pipeline.
///
/// A successful value or the [`Fault`] that ended the execution. Strategies consume and produce
/// outcomes; the pipeline never panics on behalf of a fault.
pub type Outcome<T> = Result<T, Fault>;

/// Faults that end an execution.
///
/// Every variant except [`Fault::Application`] is raised by a strategy. Application faults wrap the
/// error returned by the user operation (or by a fallback provider) and can be inspected with
/// [`Fault::downcast_ref`].
///
/// # Examples
///
/// ```
/// use bulwark::{Fault, FaultKind};
///
/// let fault = Fault::application(std::io::Error::other("connection reset"));
/// assert_eq!(fault.kind(), FaultKind::Application);
/// assert!(fault.downcast_ref::<std::io::Error>().is_some());
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Fault {
    /// The caller cancelled the execution.
    #[error("execution was cancelled")]
    Cancelled,

    /// A timeout strategy gave up waiting for the inner execution.
    #[error("execution timed out after {timeout:?}")]
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The circuit breaker is open and rejected the execution.
    #[error("circuit is open, retry after {retry_after:?}")]
    CircuitOpen {
        /// Remaining time until the circuit allows a probe.
        retry_after: Duration,
    },

    /// The circuit breaker was isolated manually and rejects every execution.
    #[error("circuit is isolated")]
    CircuitIsolated,

    /// The concurrency limiter has no free permit and no free queue slot.
    #[error("concurrency limit exceeded")]
    BulkheadRejected,

    /// The rate limiter refused to grant a lease.
    #[error("rate limit exceeded")]
    RateLimiterRejected {
        /// How long the limiter suggests waiting, when it knows.
        retry_after: Option<Duration>,
    },

    /// An error produced by the user operation.
    #[error(transparent)]
    Application(BoxError),
}

/// Field-less discriminant of [`Fault`], used for classification and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FaultKind {
    /// See [`Fault::Cancelled`].
    Cancelled,
    /// See [`Fault::TimedOut`].
    TimedOut,
    /// See [`Fault::CircuitOpen`].
    CircuitOpen,
    /// See [`Fault::CircuitIsolated`].
    CircuitIsolated,
    /// See [`Fault::BulkheadRejected`].
    BulkheadRejected,
    /// See [`Fault::RateLimiterRejected`].
    RateLimiterRejected,
    /// See [`Fault::Application`].
    Application,
}

impl FaultKind {
    /// Stable, snake-case name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::CircuitOpen => "circuit_open",
            Self::CircuitIsolated => "circuit_isolated",
            Self::BulkheadRejected => "bulkhead_rejected",
            Self::RateLimiterRejected => "rate_limiter_rejected",
            Self::Application => "application",
        }
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Fault {
    /// Wraps an application error.
    pub fn application(error: impl Into<BoxError>) -> Self {
        Self::Application(error.into())
    }

    /// Returns the discriminant of this fault.
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        match self {
            Self::Cancelled => FaultKind::Cancelled,
            Self::TimedOut { .. } => FaultKind::TimedOut,
            Self::CircuitOpen { .. } => FaultKind::CircuitOpen,
            Self::CircuitIsolated => FaultKind::CircuitIsolated,
            Self::BulkheadRejected => FaultKind::BulkheadRejected,
            Self::RateLimiterRejected { .. } => FaultKind::RateLimiterRejected,
            Self::Application(_) => FaultKind::Application,
        }
    }

    /// Returns `true` for [`Fault::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` for [`Fault::TimedOut`].
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// The delay a strategy suggested before trying again, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after } => Some(*retry_after),
            Self::RateLimiterRejected { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Attempts to view the wrapped application error as `E`.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Application(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl Recovery for Fault {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Cancelled => RecoveryInfo::never(),
            Self::TimedOut { .. } | Self::BulkheadRejected => RecoveryInfo::retry(),
            Self::CircuitOpen { retry_after } => RecoveryInfo::unavailable().delay(*retry_after),
            Self::CircuitIsolated => RecoveryInfo::unavailable(),
            Self::RateLimiterRejected { retry_after: Some(delay) } => RecoveryInfo::retry().delay(*delay),
            Self::RateLimiterRejected { retry_after: None } => RecoveryInfo::retry(),
            Self::Application(_) => RecoveryInfo::unknown(),
        }
    }
}
