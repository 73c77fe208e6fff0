// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use layered::Service;

use super::{LeaseLimiter, OnRateLimiterRejectedArgs, OnRejected, RateLimitLease, RateLimiterLayer};
use crate::telemetry::{AttributeValue, OutcomeSummary, RETRY_AFTER, Severity, TelemetryHelper, events};
use crate::{Execution, Fault, FaultKind, NotSet, Operation, Outcome, PipelineOptions, ResilienceContext, wait};

/// Admits executions according to a lease-based rate limiter.
///
/// A lease is acquired before the rest of the pipeline runs and held until it finishes. When the
/// limiter rejects the lease, the call fails with [`Fault::RateLimiterRejected`] carrying the
/// lease's retry-after hint, and the operation is not run. Waiting for a lease observes the call's
/// cancellation token.
///
/// Configure it with [`RateLimiter::layer`].
#[derive(Debug)]
pub struct RateLimiter<T, S> {
    pub(super) shared: Arc<RateLimiterShared>,
    pub(super) inner: S,
    pub(super) _out: PhantomData<fn() -> T>,
}

#[derive(Debug)]
pub(crate) struct RateLimiterShared {
    pub(crate) limiter: Limiter,
    pub(crate) on_rejected: Option<OnRejected>,
    pub(crate) telemetry: TelemetryHelper,
}

pub(crate) enum Limiter {
    External(Arc<dyn LeaseLimiter>),
    Owned(Box<dyn LeaseLimiter>),
}

impl Limiter {
    fn get(&self) -> &dyn LeaseLimiter {
        match self {
            Self::External(limiter) => &**limiter,
            Self::Owned(limiter) => &**limiter,
        }
    }
}

impl Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::External(_) => f.write_str("External"),
            Self::Owned(_) => f.write_str("Owned"),
        }
    }
}

impl Drop for RateLimiterShared {
    fn drop(&mut self) {
        if let Limiter::Owned(limiter) = &self.limiter {
            limiter.dispose();
        }
    }
}

impl<T, S: Clone> Clone for RateLimiter<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
            _out: PhantomData,
        }
    }
}

impl<T> RateLimiter<T, ()> {
    /// Starts configuring a rate limiter named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<T>) -> RateLimiterLayer<T, NotSet> {
        RateLimiterLayer::new(name.into(), options)
    }
}

impl<T, O, S> Service<Execution<T, O>> for RateLimiter<T, S>
where
    T: Send + 'static,
    O: Operation<T>,
    S: Service<Execution<T, O>, Out = Outcome<T>>,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let shared = &*self.shared;
        let context = execution.context().clone();

        let limiter = shared.limiter.get();
        let lease = match limiter.attempt_acquire(&context) {
            Some(lease) => lease,
            None => wait::or_cancelled(&context, limiter.acquire(&context)).await?,
        };
        if !lease.is_acquired() {
            return Err(shared.reject(context, lease));
        }

        if context.is_cancelled() {
            return Err(Fault::Cancelled);
        }

        let outcome = self.inner.execute(execution).await;
        drop(lease);

        outcome
    }
}

impl RateLimiterShared {
    fn reject(&self, context: ResilienceContext, lease: RateLimitLease) -> Fault {
        let retry_after = lease.retry_after();
        let attributes: Vec<(&'static str, AttributeValue)> = retry_after
            .map(|retry_after| (RETRY_AFTER, retry_after.into()))
            .into_iter()
            .collect();

        self.telemetry.report(
            events::RATE_LIMITER_REJECTED,
            Severity::Error,
            &context,
            Some(OutcomeSummary::Fault(FaultKind::RateLimiterRejected)),
            &attributes,
        );

        if let Some(on_rejected) = &self.on_rejected {
            on_rejected.call(OnRateLimiterRejectedArgs { context, lease });
        }

        Fault::RateLimiterRejected { retry_after }
    }
}
