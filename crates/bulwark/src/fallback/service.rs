// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use layered::Service;

use super::{FallbackArgs, FallbackLayer, OnFallback, OnFallbackArgs, Provider};
use crate::options::ShouldHandle;
use crate::telemetry::{OutcomeSummary, Severity, TelemetryHelper, events};
use crate::{Execution, Fault, NotSet, Operation, Outcome, PipelineOptions};

/// Replaces handled outcomes with an alternative one.
///
/// After the rest of the pipeline has produced an outcome, the predicate decides whether it is
/// replaced. Unhandled outcomes are returned unchanged. [`Fault::Cancelled`] always passes
/// through.
///
/// Configure it with [`Fallback::layer`].
#[derive(Debug)]
pub struct Fallback<T, S> {
    pub(super) shared: Arc<FallbackShared<T>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct FallbackShared<T> {
    pub(crate) provider: Provider<T>,
    pub(crate) should_handle: ShouldHandle<T>,
    pub(crate) on_fallback: Option<OnFallback<T>>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<T, S: Clone> Clone for Fallback<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<T> Fallback<T, ()> {
    /// Starts configuring a fallback named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<T>) -> FallbackLayer<T, NotSet> {
        FallbackLayer::new(name.into(), options)
    }
}

impl<T, O, S> Service<Execution<T, O>> for Fallback<T, S>
where
    T: Send + 'static,
    O: Operation<T>,
    S: Service<Execution<T, O>, Out = Outcome<T>>,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let shared = &*self.shared;
        let context = execution.context().clone();

        let outcome = self.inner.execute(execution).await;
        if matches!(outcome, Err(Fault::Cancelled)) || !shared.should_handle.call(&outcome) {
            return outcome;
        }

        shared.telemetry.report(
            events::FALLBACK,
            Severity::Warning,
            &context,
            Some(OutcomeSummary::of(&outcome)),
            &[],
        );

        if let Some(on_fallback) = &shared.on_fallback {
            on_fallback.call(&outcome, OnFallbackArgs { context: context.clone() });
        }

        shared.provider.provide(outcome, FallbackArgs { context }).await
    }
}
