// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, ready};
use parking_lot::Mutex;
use tick::Clock;

use super::{LeaseLimiter, RateLimitLease};
use crate::ResilienceContext;

/// A token bucket that never waits.
///
/// The bucket starts full with `capacity` tokens. Every execution takes one token; when none is
/// left the lease is rejected with the time until the next replenishment. Every `period` the
/// bucket is topped up by [`tokens_per_period`][Self::tokens_per_period] tokens, up to its
/// capacity.
///
/// Time is read from the clock the limiter was created with.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use bulwark::rate_limiter::{RateLimiter, TokenBucketLimiter};
/// use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let options = PipelineOptions::new(&clock);
/// let pipeline = Pipeline::builder(&options)
///     .add(RateLimiter::layer("limiter", &options).limiter(Arc::new(TokenBucketLimiter::new(&clock, 1, Duration::from_secs(1)))))
///     .build();
///
/// let context = ResilienceContext::new();
/// assert!(pipeline.execute_blocking(&context, |_| Ok::<_, Fault>(())).is_ok());
/// assert!(matches!(
///     pipeline.execute_blocking(&context, |_| Ok(())),
///     Err(Fault::RateLimiterRejected { retry_after: Some(_) })
/// ));
/// ```
#[derive(Debug)]
pub struct TokenBucketLimiter {
    clock: Clock,
    capacity: u32,
    tokens_per_period: u32,
    period: Duration,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    refilled_at: Instant,
}

impl TokenBucketLimiter {
    /// Creates a full bucket of `capacity` tokens that refills completely every `period`.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` or `period` is zero.
    #[must_use]
    pub fn new(clock: &Clock, capacity: u32, period: Duration) -> Self {
        assert!(capacity >= 1, "token capacity must be at least 1");
        assert!(!period.is_zero(), "replenishment period must be positive");

        Self {
            clock: clock.clone(),
            capacity,
            tokens_per_period: capacity,
            period,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                refilled_at: clock.instant(),
            }),
        }
    }

    /// Sets how many tokens are added every period.
    ///
    /// **Default**: the capacity
    ///
    /// # Panics
    ///
    /// Panics when `tokens` is zero.
    #[must_use]
    pub fn tokens_per_period(mut self, tokens: u32) -> Self {
        assert!(tokens >= 1, "tokens per period must be at least 1");
        self.tokens_per_period = tokens;
        self
    }

    /// Takes a token if one is available.
    pub fn try_acquire(&self) -> RateLimitLease {
        let now = self.clock.instant();
        let mut bucket = self.bucket.lock();

        self.replenish(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            RateLimitLease::acquired()
        } else {
            let since_refill = now.saturating_duration_since(bucket.refilled_at);
            RateLimitLease::rejected(Some(self.period.saturating_sub(since_refill)))
        }
    }

    /// Tokens left in the bucket.
    #[must_use]
    pub fn available(&self) -> u32 {
        let now = self.clock.instant();
        let mut bucket = self.bucket.lock();
        self.replenish(&mut bucket, now);
        bucket.tokens
    }

    fn replenish(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        let periods = elapsed.as_nanos() / self.period.as_nanos();
        if periods == 0 {
            return;
        }

        let added = periods.saturating_mul(u128::from(self.tokens_per_period));
        let tokens = u128::from(bucket.tokens).saturating_add(added).min(u128::from(self.capacity));
        bucket.tokens = u32::try_from(tokens).unwrap_or(self.capacity);

        // A full bucket restarts its period; a partial one keeps the period boundary.
        bucket.refilled_at = match u32::try_from(periods) {
            Ok(periods) if bucket.tokens < self.capacity => bucket.refilled_at + self.period * periods,
            _ => now,
        };
    }
}

impl LeaseLimiter for TokenBucketLimiter {
    fn acquire<'a>(&'a self, _context: &'a ResilienceContext) -> BoxFuture<'a, RateLimitLease> {
        Box::pin(ready(self.try_acquire()))
    }

    fn attempt_acquire(&self, _context: &ResilienceContext) -> Option<RateLimitLease> {
        Some(self.try_acquire())
    }
}
