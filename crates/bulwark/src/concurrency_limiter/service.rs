// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use layered::Service;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::{ConcurrencyLimiterLayer, OnConcurrencyRejectedArgs, OnRejected};
use crate::telemetry::{OutcomeSummary, Severity, TelemetryHelper, events};
use crate::{Execution, Fault, FaultKind, Operation, Outcome, PipelineOptions, ResilienceContext, wait};

/// Limits how many executions run through the rest of the pipeline at the same time.
///
/// An execution takes a permit when one is free. Otherwise it waits in a bounded queue until a
/// permit is released or the call is cancelled; when the queue is full it is rejected with
/// [`Fault::BulkheadRejected`] without running the operation. Waiting executions are admitted in
/// arrival order.
///
/// The permit is held while the inner strategies run and released on every exit path, including
/// when the call future is dropped.
///
/// Configure it with [`ConcurrencyLimiter::layer`].
#[derive(Debug)]
pub struct ConcurrencyLimiter<T, S> {
    pub(super) shared: Arc<ConcurrencyLimiterShared>,
    pub(super) inner: S,
    pub(super) _out: PhantomData<fn() -> T>,
}

#[derive(Debug)]
pub(crate) struct ConcurrencyLimiterShared {
    pub(crate) semaphore: Semaphore,
    pub(crate) queued: AtomicUsize,
    pub(crate) permit_limit: u32,
    pub(crate) queue_limit: u32,
    pub(crate) on_rejected: Option<OnRejected>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<T, S: Clone> Clone for ConcurrencyLimiter<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
            _out: PhantomData,
        }
    }
}

impl<T> ConcurrencyLimiter<T, ()> {
    /// Starts configuring a concurrency limiter named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<T>) -> ConcurrencyLimiterLayer<T> {
        ConcurrencyLimiterLayer::new(name.into(), options)
    }
}

impl<T, S> ConcurrencyLimiter<T, S> {
    /// Permits that are not held by a running execution.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.shared.semaphore.available_permits()
    }

    /// Executions waiting for a permit.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }
}

impl<T, O, S> Service<Execution<T, O>> for ConcurrencyLimiter<T, S>
where
    T: Send + 'static,
    O: Operation<T>,
    S: Service<Execution<T, O>, Out = Outcome<T>>,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let _permit = self.shared.acquire(execution.context()).await?;

        self.inner.execute(execution).await
    }
}

impl ConcurrencyLimiterShared {
    async fn acquire(&self, context: &ResilienceContext) -> Result<SemaphorePermit<'_>, Fault> {
        if context.is_cancelled() {
            return Err(Fault::Cancelled);
        }

        if let Ok(permit) = self.semaphore.try_acquire() {
            return Ok(permit);
        }

        let Some(_slot) = QueueSlot::take(&self.queued, self.queue_limit) else {
            return Err(self.reject(context));
        };

        match wait::or_cancelled(context, self.semaphore.acquire()).await? {
            Ok(permit) => Ok(permit),
            // The semaphore is never closed.
            Err(_) => Err(self.reject(context)),
        }
    }

    fn reject(&self, context: &ResilienceContext) -> Fault {
        self.telemetry.report(
            events::CONCURRENCY_LIMITER_REJECTED,
            Severity::Error,
            context,
            Some(OutcomeSummary::Fault(FaultKind::BulkheadRejected)),
            &[],
        );

        if let Some(on_rejected) = &self.on_rejected {
            on_rejected.call(OnConcurrencyRejectedArgs {
                context: context.clone(),
                permit_limit: self.permit_limit,
                queue_limit: self.queue_limit,
            });
        }

        Fault::BulkheadRejected
    }
}

/// A place in the wait queue, given back on drop.
struct QueueSlot<'a>(&'a AtomicUsize);

impl<'a> QueueSlot<'a> {
    fn take(queued: &'a AtomicUsize, queue_limit: u32) -> Option<Self> {
        let limit = queue_limit as usize;

        queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| (current < limit).then_some(current + 1))
            .ok()
            .map(|_| Self(queued))
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
