// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;
use tower_layer::Layer;

use super::backoff::BackoffOptions;
use super::constants::DEFAULT_RETRY_ATTEMPTS;
use super::{Backoff, DelayArgs, DelayGenerator, OnRetry, OnRetryArgs, Retry, RetryShared};
use crate::options::{AttemptLimit, ShouldHandle};
use crate::telemetry::TelemetryHelper;
use crate::{Outcome, PipelineOptions};

/// Builder for the [`Retry`] strategy.
///
/// Created by [`Retry::layer`]. Every property has a default, so the layer can be added to a
/// pipeline as is.
///
/// For examples, see the [retry module][crate::retry] documentation.
#[derive(Debug)]
pub struct RetryLayer<T> {
    clock: Clock,
    attempts: AttemptLimit,
    backoff: BackoffOptions,
    should_handle: ShouldHandle<T>,
    delay_generator: Option<DelayGenerator<T>>,
    on_retry: Option<OnRetry<T>>,
    telemetry: TelemetryHelper,
}

impl<T> RetryLayer<T> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<T>) -> Self {
        Self {
            clock: options.clock().clone(),
            attempts: AttemptLimit::from_retries(DEFAULT_RETRY_ATTEMPTS),
            backoff: BackoffOptions::default(),
            should_handle: ShouldHandle::faults(),
            delay_generator: None,
            on_retry: None,
            telemetry: options.create_telemetry(name),
        }
    }

    /// Sets how many times a handled outcome is retried.
    ///
    /// The operation runs at most `max_retry_attempts + 1` times.
    ///
    /// **Default**: 3
    #[must_use]
    pub fn max_retry_attempts(mut self, max_retry_attempts: u32) -> Self {
        self.attempts = AttemptLimit::from_retries(max_retry_attempts);
        self
    }

    /// Retries until the outcome is no longer handled or the call is cancelled.
    #[must_use]
    pub fn infinite_retry_attempts(mut self) -> Self {
        self.attempts = AttemptLimit::Unbounded;
        self
    }

    /// Sets how the delay grows between retries.
    ///
    /// **Default**: [`Backoff::Exponential`]
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff.kind = backoff;
        self
    }

    /// Sets the delay the backoff is computed from. A zero delay retries immediately.
    ///
    /// **Default**: 2 seconds
    #[must_use]
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.backoff.base_delay = base_delay;
        self
    }

    /// Caps every retry delay, including generated and hinted ones.
    ///
    /// **Default**: no cap
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.backoff.max_delay = Some(max_delay);
        self
    }

    /// Enables or disables randomization of the backoff delays.
    ///
    /// **Default**: `true`
    #[must_use]
    pub fn use_jitter(mut self, use_jitter: bool) -> Self {
        self.backoff.jitter = use_jitter;
        self
    }

    /// Sets the predicate deciding which outcomes are retried.
    ///
    /// A cancelled outcome is never retried, whatever the predicate says.
    ///
    /// **Default**: every fault except [`Fault::Cancelled`][crate::Fault::Cancelled]
    #[must_use]
    pub fn should_handle(mut self, predicate: impl Fn(&Outcome<T>) -> bool + Send + Sync + 'static) -> Self {
        self.should_handle = ShouldHandle::new(predicate);
        self
    }

    /// Computes retry delays instead of the backoff.
    ///
    /// The generator receives the handled outcome and the delay the backoff would use. Returning
    /// `None` falls back to the recovery hint of the fault, then to the backoff delay.
    #[must_use]
    pub fn delay_generator(mut self, generator: impl Fn(&Outcome<T>, DelayArgs) -> Option<Duration> + Send + Sync + 'static) -> Self {
        self.delay_generator = Some(DelayGenerator::new(generator));
        self
    }

    /// Registers a callback invoked right before each retry.
    ///
    /// The callback is skipped when the call is cancelled during the retry delay.
    #[must_use]
    pub fn on_retry(mut self, callback: impl Fn(&Outcome<T>, OnRetryArgs) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(OnRetry::new(callback));
        self
    }
}

impl<T, S> Layer<S> for RetryLayer<T> {
    type Service = Retry<T, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let shared = RetryShared {
            clock: self.clock.clone(),
            attempts: self.attempts,
            backoff: self.backoff.clone(),
            should_handle: self.should_handle.clone(),
            delay_generator: self.delay_generator.clone(),
            on_retry: self.on_retry.clone(),
            telemetry: self.telemetry.clone(),
        };

        Retry {
            shared: Arc::new(shared),
            inner,
        }
    }
}
