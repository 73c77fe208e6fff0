// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::ResilienceContext;

/// A lease-based rate limiter that the [`RateLimiter`][super::RateLimiter] strategy delegates to.
///
/// Implement this trait to plug an existing limiter into a pipeline. [`TokenBucketLimiter`]
/// is the built-in implementation.
///
/// [`TokenBucketLimiter`]: super::TokenBucketLimiter
pub trait LeaseLimiter: Send + Sync + 'static {
    /// Acquires a lease for one execution.
    ///
    /// The returned future may wait for capacity. It is dropped without completing when the
    /// call is cancelled.
    fn acquire<'a>(&'a self, context: &'a ResilienceContext) -> BoxFuture<'a, RateLimitLease>;

    /// Decides on a lease without waiting, when the limiter can.
    ///
    /// Returning `None` defers to [`acquire`][Self::acquire]. Limiters that never wait should
    /// answer here, which spares the strategy the boxed future.
    fn attempt_acquire(&self, _context: &ResilienceContext) -> Option<RateLimitLease> {
        None
    }

    /// Releases resources held by the limiter.
    ///
    /// Called once when a pipeline that created the limiter through
    /// [`limiter_factory`][super::RateLimiterLayer::limiter_factory] is dropped. Never called for
    /// limiters passed to [`limiter`][super::RateLimiterLayer::limiter].
    fn dispose(&self) {}
}

/// The answer of a [`LeaseLimiter`] to an acquisition.
///
/// An acquired lease admits one execution and is held until it finishes; dropping it runs the
/// release action given to [`acquired_with_release`][Self::acquired_with_release]. A rejected
/// lease may carry how long the caller should wait before trying again.
#[must_use]
pub struct RateLimitLease {
    acquired: bool,
    retry_after: Option<Duration>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RateLimitLease {
    /// An acquired lease with nothing to release.
    pub fn acquired() -> Self {
        Self {
            acquired: true,
            retry_after: None,
            release: None,
        }
    }

    /// An acquired lease that runs `release` when dropped.
    pub fn acquired_with_release(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            acquired: true,
            retry_after: None,
            release: Some(Box::new(release)),
        }
    }

    /// A rejected lease, optionally suggesting when to try again.
    pub fn rejected(retry_after: Option<Duration>) -> Self {
        Self {
            acquired: false,
            retry_after,
            release: None,
        }
    }

    /// Returns `true` when the execution may proceed.
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// How long the limiter suggests waiting before the next attempt.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl Drop for RateLimitLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Debug for RateLimitLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitLease")
            .field("acquired", &self.acquired)
            .field("retry_after", &self.retry_after)
            .finish_non_exhaustive()
    }
}
