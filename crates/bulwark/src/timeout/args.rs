// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::time::Duration;

use super::AbandonedTask;
use crate::ResilienceContext;

/// Arguments for the [`timeout_provider`][super::TimeoutLayer::timeout_provider] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct TimeoutProviderArgs {
    pub(super) default_timeout: Duration,
}

impl TimeoutProviderArgs {
    /// The timeout configured with [`timeout`][super::TimeoutLayer::timeout].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// Arguments for the [`on_timeout`][super::TimeoutLayer::on_timeout] callback.
pub struct OnTimeoutArgs<T> {
    pub(super) context: ResilienceContext,
    pub(super) timeout: Duration,
    pub(super) elapsed: Duration,
    pub(super) abandoned: Option<AbandonedTask<T>>,
}

impl<T> OnTimeoutArgs<T> {
    /// The context of the timed out call.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// The timeout that applied to the call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time from the start of the call until the timeout was detected.
    ///
    /// Exceeds the timeout when a blocking operation ignored cancellation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns `true` while [`take_abandoned`][Self::take_abandoned] can return the operation.
    #[must_use]
    pub fn has_abandoned(&self) -> bool {
        self.abandoned.is_some()
    }

    /// Takes the operation left running by an abandon-and-race timeout.
    ///
    /// Absent for cooperative timeouts and when the operation finished on its own before the
    /// callback ran. Dropping the task leaves the operation running detached.
    pub fn take_abandoned(&mut self) -> Option<AbandonedTask<T>> {
        self.abandoned.take()
    }
}

impl<T> Debug for OnTimeoutArgs<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnTimeoutArgs")
            .field("context", &self.context)
            .field("timeout", &self.timeout)
            .field("elapsed", &self.elapsed)
            .field("abandoned", &self.abandoned.is_some())
            .finish()
    }
}
