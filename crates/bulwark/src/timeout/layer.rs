// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use anyspawn::Spawner;
use tick::Clock;
use tower_layer::Layer;

use super::{Discipline, OnTimeout, OnTimeoutArgs, Timeout, TimeoutProvider, TimeoutProviderArgs, TimeoutShared};
use crate::telemetry::TelemetryHelper;
use crate::{NotSet, PipelineOptions, ResilienceContext, Set};

/// Builder for the [`Timeout`] strategy.
///
/// Created by [`Timeout::layer`]. The [`timeout`][TimeoutLayer::timeout] is required: until it
/// is set the builder does not implement [`Layer`] and cannot be added to a pipeline.
///
/// # Type State
///
/// - `S1`: tracks whether [`timeout`][TimeoutLayer::timeout] has been set
#[derive(Debug)]
pub struct TimeoutLayer<T, S1 = Set> {
    clock: Clock,
    timeout: Duration,
    provider: Option<TimeoutProvider>,
    discipline: Discipline,
    on_timeout: Option<OnTimeout<T>>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(S1) -> T>,
}

impl<T> TimeoutLayer<T, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<T>) -> Self {
        Self {
            clock: options.clock().clone(),
            timeout: Duration::ZERO,
            provider: None,
            discipline: Discipline::Cooperative,
            on_timeout: None,
            telemetry: options.create_telemetry(name),
            _state: PhantomData,
        }
    }
}

impl<T, S1> TimeoutLayer<T, S1> {
    /// Sets the upper bound for one pass through the inner strategies.
    ///
    /// # Panics
    ///
    /// Panics when `timeout` is zero.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> TimeoutLayer<T, Set> {
        assert!(!timeout.is_zero(), "timeout must be positive");
        self.timeout = timeout;
        self.into_state()
    }

    /// Computes the timeout per execution.
    ///
    /// Returning `None` keeps the configured [`timeout`][TimeoutLayer::timeout]. Returning
    /// [`Duration::ZERO`] runs the execution without a timeout.
    #[must_use]
    pub fn timeout_provider(
        mut self,
        provider: impl Fn(&ResilienceContext, TimeoutProviderArgs) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.provider = Some(TimeoutProvider::new(provider));
        self
    }

    /// Cancels the inner execution when the timeout elapses and stops waiting for it.
    ///
    /// An asynchronous execution is dropped at the deadline. A blocking execution cannot be
    /// interrupted: its token is cancelled at the deadline and the timeout is reported once the
    /// operation returns.
    ///
    /// This is the default.
    #[must_use]
    pub fn cooperative(mut self) -> Self {
        self.discipline = Discipline::Cooperative;
        self
    }

    /// Runs the inner execution away from the caller and returns as soon as the timeout elapses.
    ///
    /// Asynchronous executions are spawned with `spawner`; blocking executions run on a
    /// dedicated thread. At the deadline the token of the inner execution is cancelled and the
    /// caller gets [`Fault::TimedOut`][crate::Fault::TimedOut] right away, while the operation
    /// keeps running. The [`on_timeout`][TimeoutLayer::on_timeout] callback can take it over
    /// through [`OnTimeoutArgs::take_abandoned`].
    #[must_use]
    pub fn abandon_and_race(mut self, spawner: Spawner) -> Self {
        self.discipline = Discipline::AbandonAndRace(spawner);
        self
    }

    /// Registers a callback invoked when an execution times out.
    #[must_use]
    pub fn on_timeout(mut self, callback: impl Fn(OnTimeoutArgs<T>) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(OnTimeout::new(callback));
        self
    }

    fn into_state<S>(self) -> TimeoutLayer<T, S> {
        TimeoutLayer {
            clock: self.clock,
            timeout: self.timeout,
            provider: self.provider,
            discipline: self.discipline,
            on_timeout: self.on_timeout,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<T, S> Layer<S> for TimeoutLayer<T, Set> {
    type Service = Timeout<T, S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timeout {
            shared: Arc::new(TimeoutShared {
                clock: self.clock.clone(),
                timeout: self.timeout,
                provider: self.provider.clone(),
                discipline: self.discipline.clone(),
                on_timeout: self.on_timeout.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner: Arc::new(inner),
        }
    }
}
