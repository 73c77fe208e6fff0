// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use tower_layer::Layer;

use super::{AsyncProvider, Fallback, FallbackArgs, FallbackShared, OnFallback, OnFallbackArgs, Provider, SyncProvider};
use crate::options::ShouldHandle;
use crate::telemetry::TelemetryHelper;
use crate::{NotSet, Outcome, PipelineOptions, Set};

/// Builder for the [`Fallback`] strategy.
///
/// Created by [`Fallback::layer`]. A provider is required, given either with
/// [`fallback`][FallbackLayer::fallback] or [`fallback_async`][FallbackLayer::fallback_async];
/// until then the builder does not implement [`Layer`].
///
/// # Type State
///
/// - `S1`: tracks whether a provider has been set
#[derive(Debug)]
pub struct FallbackLayer<T, S1 = Set> {
    provider: Option<Provider<T>>,
    should_handle: ShouldHandle<T>,
    on_fallback: Option<OnFallback<T>>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(S1) -> T>,
}

impl<T> FallbackLayer<T, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<T>) -> Self {
        Self {
            provider: None,
            should_handle: ShouldHandle::faults(),
            on_fallback: None,
            telemetry: options.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<T, S1> FallbackLayer<T, S1> {
    /// Replaces handled outcomes with the result of `provider`.
    ///
    /// The provider receives the original outcome. If it returns a fault, that fault becomes the
    /// result of the call.
    #[must_use]
    pub fn fallback(
        mut self,
        provider: impl Fn(Outcome<T>, FallbackArgs) -> Outcome<T> + Send + Sync + 'static,
    ) -> FallbackLayer<T, Set> {
        self.provider = Some(Provider::Sync(SyncProvider::new(provider)));
        self.into_state()
    }

    /// Replaces handled outcomes with the result of an asynchronous `provider`.
    ///
    /// In blocking executions the provider future is driven on the calling thread.
    #[must_use]
    pub fn fallback_async<F, Fut>(mut self, provider: F) -> FallbackLayer<T, Set>
    where
        F: Fn(Outcome<T>, FallbackArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        self.provider = Some(Provider::Async(AsyncProvider::new(move |outcome, args| Box::pin(provider(outcome, args)))));
        self.into_state()
    }

    /// Sets the predicate deciding which outcomes are replaced.
    ///
    /// [`Fault::Cancelled`][crate::Fault::Cancelled] is never replaced, whatever the predicate
    /// says.
    ///
    /// **Default**: every fault except cancellation
    #[must_use]
    pub fn should_handle(mut self, predicate: impl Fn(&Outcome<T>) -> bool + Send + Sync + 'static) -> Self {
        self.should_handle = ShouldHandle::new(predicate);
        self
    }

    /// Registers a callback invoked before the provider runs.
    #[must_use]
    pub fn on_fallback(mut self, callback: impl Fn(&Outcome<T>, OnFallbackArgs) + Send + Sync + 'static) -> Self {
        self.on_fallback = Some(OnFallback::new(callback));
        self
    }

    fn into_state<S>(self) -> FallbackLayer<T, S> {
        FallbackLayer {
            provider: self.provider,
            should_handle: self.should_handle,
            on_fallback: self.on_fallback,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<T, S> Layer<S> for FallbackLayer<T, Set> {
    type Service = Fallback<T, S>;

    fn layer(&self, inner: S) -> Self::Service {
        Fallback {
            shared: Arc::new(FallbackShared {
                provider: self.provider.clone().expect("provider must be set in Ready state"),
                should_handle: self.should_handle.clone(),
                on_fallback: self.on_fallback.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner,
        }
    }
}
