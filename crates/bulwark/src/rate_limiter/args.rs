// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::RateLimitLease;
use crate::ResilienceContext;

/// Arguments for the [`on_rejected`][super::RateLimiterLayer::on_rejected] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnRateLimiterRejectedArgs {
    pub(super) context: ResilienceContext,
    pub(super) lease: RateLimitLease,
}

impl OnRateLimiterRejectedArgs {
    /// The context of the rejected call.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// The rejected lease returned by the limiter.
    #[must_use]
    pub fn lease(&self) -> &RateLimitLease {
        &self.lease
    }

    /// The retry-after hint of the rejected lease.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.lease.retry_after()
    }
}
