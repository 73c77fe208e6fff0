// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{Attempt, ResilienceContext};

/// Arguments for the [`delay_generator`][super::RetryLayer::delay_generator] callback.
#[derive(Debug)]
pub struct DelayArgs {
    pub(super) attempt: Attempt,
    pub(super) backoff_delay: Duration,
}

impl DelayArgs {
    /// The attempt that produced the outcome.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The delay the configured backoff would use.
    #[must_use]
    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }
}

/// Arguments for the [`on_retry`][super::RetryLayer::on_retry] callback.
///
/// The callback runs after the retry delay elapsed, right before the next attempt.
#[derive(Debug)]
pub struct OnRetryArgs {
    pub(super) attempt: Attempt,
    pub(super) retry_delay: Duration,
    pub(super) context: ResilienceContext,
}

impl OnRetryArgs {
    /// The attempt that failed and is being retried.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The delay that preceded this retry.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// The context of the call.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }
}
