// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use tower_layer::Layer;

use super::{LeaseLimiter, Limiter, LimiterFactory, OnRateLimiterRejectedArgs, OnRejected, RateLimiter, RateLimiterShared};
use crate::telemetry::TelemetryHelper;
use crate::{NotSet, PipelineOptions, Set};

#[derive(Clone)]
enum Source {
    External(Arc<dyn LeaseLimiter>),
    Factory(LimiterFactory),
}

impl Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::External(_) => f.write_str("External"),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Builder for the [`RateLimiter`] strategy.
///
/// Created by [`RateLimiter::layer`]. A limiter is required, given either with
/// [`limiter`][RateLimiterLayer::limiter] or [`limiter_factory`][RateLimiterLayer::limiter_factory];
/// until then the builder does not implement [`Layer`].
///
/// # Type State
///
/// - `S1`: tracks whether a limiter has been set
#[derive(Debug)]
pub struct RateLimiterLayer<T, S1 = Set> {
    source: Option<Source>,
    on_rejected: Option<OnRejected>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(S1) -> T>,
}

impl<T> RateLimiterLayer<T, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<T>) -> Self {
        Self {
            source: None,
            on_rejected: None,
            telemetry: options.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<T, S1> RateLimiterLayer<T, S1> {
    /// Uses a limiter owned by the caller.
    ///
    /// The limiter may be shared with other pipelines and is never disposed by this strategy.
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<dyn LeaseLimiter>) -> RateLimiterLayer<T, Set> {
        self.source = Some(Source::External(limiter));
        self.into_state()
    }

    /// Creates a limiter for each pipeline built from this layer.
    ///
    /// The pipeline owns the limiter and calls [`LeaseLimiter::dispose`] when it is dropped.
    #[must_use]
    pub fn limiter_factory<L: LeaseLimiter>(mut self, factory: impl Fn() -> L + Send + Sync + 'static) -> RateLimiterLayer<T, Set> {
        self.source = Some(Source::Factory(LimiterFactory::new(move || Box::new(factory()) as Box<dyn LeaseLimiter>)));
        self.into_state()
    }

    /// Registers a callback invoked when the limiter rejects an execution.
    #[must_use]
    pub fn on_rejected(mut self, callback: impl Fn(OnRateLimiterRejectedArgs) + Send + Sync + 'static) -> Self {
        self.on_rejected = Some(OnRejected::new(callback));
        self
    }

    fn into_state<S>(self) -> RateLimiterLayer<T, S> {
        RateLimiterLayer {
            source: self.source,
            on_rejected: self.on_rejected,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<T, S> Layer<S> for RateLimiterLayer<T, Set> {
    type Service = RateLimiter<T, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let limiter = match self.source.as_ref().expect("limiter must be set in Ready state") {
            Source::External(limiter) => Limiter::External(Arc::clone(limiter)),
            Source::Factory(factory) => Limiter::Owned(factory.call()),
        };

        RateLimiter {
            shared: Arc::new(RateLimiterShared {
                limiter,
                on_rejected: self.on_rejected.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner,
            _out: PhantomData,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tick::Clock;

    use super::*;
    use crate::rate_limiter::TokenBucketLimiter;

    fn layer() -> RateLimiterLayer<String, NotSet> {
        RateLimiter::layer("limiter", &PipelineOptions::new(Clock::new_frozen()))
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(RateLimiterLayer<String, Set>: Layer<String>, Debug, Send, Sync);
        static_assertions::assert_not_impl_all!(RateLimiterLayer<String, NotSet>: Layer<String>);
    }

    #[test]
    fn external_limiter_is_shared() {
        let bucket = Arc::new(TokenBucketLimiter::new(&Clock::new_frozen(), 1, Duration::from_secs(1)));
        let layer = layer().limiter(Arc::<TokenBucketLimiter>::clone(&bucket)).on_rejected(|_| {});

        let first = layer.layer(());
        let second = layer.layer(());

        assert!(matches!(first.shared.limiter, Limiter::External(_)));
        assert!(matches!(second.shared.limiter, Limiter::External(_)));
        assert!(layer.on_rejected.is_some());
        assert_eq!(Arc::strong_count(&bucket), 4);
    }

    #[test]
    fn factory_creates_limiter_per_service() {
        let layer = layer().limiter_factory(|| TokenBucketLimiter::new(&Clock::new_frozen(), 1, Duration::from_secs(1)));

        let service = layer.layer(());

        assert!(matches!(service.shared.limiter, Limiter::Owned(_)));
    }
}
