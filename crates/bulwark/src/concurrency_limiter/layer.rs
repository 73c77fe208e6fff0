// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use tokio::sync::Semaphore;
use tower_layer::Layer;

use super::constants::{DEFAULT_PERMIT_LIMIT, DEFAULT_QUEUE_LIMIT};
use super::{ConcurrencyLimiter, ConcurrencyLimiterShared, OnConcurrencyRejectedArgs, OnRejected};
use crate::PipelineOptions;
use crate::telemetry::TelemetryHelper;

/// Builder for the [`ConcurrencyLimiter`] strategy.
///
/// Created by [`ConcurrencyLimiter::layer`]. Each call to [`Layer::layer`] creates an independent
/// set of permits.
#[derive(Debug)]
pub struct ConcurrencyLimiterLayer<T> {
    permit_limit: u32,
    queue_limit: u32,
    on_rejected: Option<OnRejected>,
    telemetry: TelemetryHelper,
    _out: PhantomData<fn() -> T>,
}

impl<T> ConcurrencyLimiterLayer<T> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<T>) -> Self {
        Self {
            permit_limit: DEFAULT_PERMIT_LIMIT,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            on_rejected: None,
            telemetry: options.create_telemetry(name),
            _out: PhantomData,
        }
    }

    /// Sets how many executions may run at the same time.
    ///
    /// **Default**: 1000
    ///
    /// # Panics
    ///
    /// Panics when `permit_limit` is zero.
    #[must_use]
    pub fn permit_limit(mut self, permit_limit: u32) -> Self {
        assert!(permit_limit >= 1, "permit limit must be at least 1");
        self.permit_limit = permit_limit;
        self
    }

    /// Sets how many executions may wait for a permit when all are taken.
    ///
    /// Executions beyond the queue are rejected right away.
    ///
    /// **Default**: 0
    #[must_use]
    pub fn queue_limit(mut self, queue_limit: u32) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    /// Registers a callback invoked when an execution is rejected.
    #[must_use]
    pub fn on_rejected(mut self, callback: impl Fn(OnConcurrencyRejectedArgs) + Send + Sync + 'static) -> Self {
        self.on_rejected = Some(OnRejected::new(callback));
        self
    }
}

impl<T, S> Layer<S> for ConcurrencyLimiterLayer<T> {
    type Service = ConcurrencyLimiter<T, S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConcurrencyLimiter {
            shared: Arc::new(ConcurrencyLimiterShared {
                semaphore: Semaphore::new(self.permit_limit as usize),
                queued: AtomicUsize::new(0),
                permit_limit: self.permit_limit,
                queue_limit: self.queue_limit,
                on_rejected: self.on_rejected.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner,
            _out: PhantomData,
        }
    }
}
