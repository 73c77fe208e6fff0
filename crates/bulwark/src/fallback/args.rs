// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ResilienceContext;

/// Arguments for the fallback provider.
#[derive(Debug)]
#[non_exhaustive]
pub struct FallbackArgs {
    pub(super) context: ResilienceContext,
}

impl FallbackArgs {
    /// The context of the call being replaced.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }
}

/// Arguments for the [`on_fallback`][super::FallbackLayer::on_fallback] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnFallbackArgs {
    pub(super) context: ResilienceContext,
}

impl OnFallbackArgs {
    /// The context of the call being replaced.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }
}
