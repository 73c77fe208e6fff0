// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ResilienceContext;

/// Arguments for the [`on_rejected`][super::ConcurrencyLimiterLayer::on_rejected] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnConcurrencyRejectedArgs {
    pub(super) context: ResilienceContext,
    pub(super) permit_limit: u32,
    pub(super) queue_limit: u32,
}

impl OnConcurrencyRejectedArgs {
    /// The context of the rejected call.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// The configured number of concurrent executions.
    #[must_use]
    pub fn permit_limit(&self) -> u32 {
        self.permit_limit
    }

    /// The configured number of waiting executions.
    #[must_use]
    pub fn queue_limit(&self) -> u32 {
        self.queue_limit
    }
}
