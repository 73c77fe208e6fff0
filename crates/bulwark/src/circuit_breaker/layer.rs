// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;
use tower_layer::Layer;

use super::breaker::Breaker;
use super::constants::{DEFAULT_BREAK_DURATION, DEFAULT_FAILURE_RATIO, DEFAULT_MINIMUM_THROUGHPUT, DEFAULT_SAMPLING_DURATION};
use super::engine::{Engine, EngineOptions};
use super::{
    CircuitBreaker, CircuitBreakerControl, CircuitBreakerShared, OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs,
    OnClosed, OnHalfOpened, OnOpened,
};
use crate::options::ShouldHandle;
use crate::telemetry::TelemetryHelper;
use crate::{Outcome, PipelineOptions};

/// Builder for the [`CircuitBreaker`] strategy.
///
/// Created by [`CircuitBreaker::layer`]. Every property has a default. Invalid thresholds panic
/// when they are set, so a misconfigured breaker never reaches a pipeline.
///
/// Each call to [`Layer::layer`] creates an independent circuit.
#[derive(Debug)]
pub struct CircuitBreakerLayer<T> {
    clock: Clock,
    options: EngineOptions,
    should_handle: ShouldHandle<T>,
    on_opened: Option<OnOpened>,
    on_closed: Option<OnClosed>,
    on_half_opened: Option<OnHalfOpened>,
    controls: Vec<CircuitBreakerControl>,
    telemetry: TelemetryHelper,
}

impl<T> CircuitBreakerLayer<T> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PipelineOptions<T>) -> Self {
        Self {
            clock: options.clock().clone(),
            options: EngineOptions {
                failure_ratio: DEFAULT_FAILURE_RATIO,
                minimum_throughput: DEFAULT_MINIMUM_THROUGHPUT,
                sampling_duration: DEFAULT_SAMPLING_DURATION,
                break_duration: DEFAULT_BREAK_DURATION,
            },
            should_handle: ShouldHandle::faults(),
            on_opened: None,
            on_closed: None,
            on_half_opened: None,
            controls: Vec::new(),
            telemetry: options.create_telemetry(name),
        }
    }

    /// Sets the failure rate at which the circuit opens.
    ///
    /// **Default**: 0.1
    ///
    /// # Panics
    ///
    /// Panics when `failure_ratio` is not within `[0.0, 1.0]`.
    #[must_use]
    pub fn failure_ratio(mut self, failure_ratio: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_ratio),
            "failure ratio must be within [0, 1], got {failure_ratio}"
        );
        self.options.failure_ratio = failure_ratio;
        self
    }

    /// Sets how many executions the sampling window must contain before the circuit may open.
    ///
    /// **Default**: 100
    ///
    /// # Panics
    ///
    /// Panics when `minimum_throughput` is zero.
    #[must_use]
    pub fn minimum_throughput(mut self, minimum_throughput: u32) -> Self {
        assert!(minimum_throughput >= 1, "minimum throughput must be at least 1");
        self.options.minimum_throughput = minimum_throughput;
        self
    }

    /// Sets the trailing time span the failure rate is computed over.
    ///
    /// The span is tracked in ten windows, so outcomes leave the sample in steps of a tenth of
    /// the sampling duration.
    ///
    /// **Default**: 30 seconds
    ///
    /// # Panics
    ///
    /// Panics when `sampling_duration` is zero.
    #[must_use]
    pub fn sampling_duration(mut self, sampling_duration: Duration) -> Self {
        assert!(!sampling_duration.is_zero(), "sampling duration must be positive");
        self.options.sampling_duration = sampling_duration;
        self
    }

    /// Sets how long an opened circuit rejects executions before allowing a probe.
    ///
    /// **Default**: 5 seconds
    ///
    /// # Panics
    ///
    /// Panics when `break_duration` is zero.
    #[must_use]
    pub fn break_duration(mut self, break_duration: Duration) -> Self {
        assert!(!break_duration.is_zero(), "break duration must be positive");
        self.options.break_duration = break_duration;
        self
    }

    /// Sets the predicate deciding which outcomes count as failures.
    ///
    /// Outcomes the predicate rejects count as successes. Cancelled executions are not counted.
    ///
    /// **Default**: every fault except [`Fault::Cancelled`][crate::Fault::Cancelled]
    #[must_use]
    pub fn should_handle(mut self, predicate: impl Fn(&Outcome<T>) -> bool + Send + Sync + 'static) -> Self {
        self.should_handle = ShouldHandle::new(predicate);
        self
    }

    /// Registers a callback invoked when the circuit opens or is isolated.
    #[must_use]
    pub fn on_opened(mut self, callback: impl Fn(OnCircuitOpenedArgs) + Send + Sync + 'static) -> Self {
        self.on_opened = Some(OnOpened::new(callback));
        self
    }

    /// Registers a callback invoked when the circuit closes.
    #[must_use]
    pub fn on_closed(mut self, callback: impl Fn(OnCircuitClosedArgs) + Send + Sync + 'static) -> Self {
        self.on_closed = Some(OnClosed::new(callback));
        self
    }

    /// Registers a callback invoked when the circuit lets a probe through.
    #[must_use]
    pub fn on_half_opened(mut self, callback: impl Fn(OnCircuitHalfOpenedArgs) + Send + Sync + 'static) -> Self {
        self.on_half_opened = Some(OnHalfOpened::new(callback));
        self
    }

    /// Attaches `control` to the circuits this layer creates.
    #[must_use]
    pub fn control(mut self, control: &CircuitBreakerControl) -> Self {
        self.controls.push(control.clone());
        self
    }
}

impl<T, S> Layer<S> for CircuitBreakerLayer<T> {
    type Service = CircuitBreaker<T, S>;

    fn layer(&self, inner: S) -> Self::Service {
        let breaker = Arc::new(Breaker {
            engine: Engine::new(self.options, self.clock.clone()),
            on_opened: self.on_opened.clone(),
            on_closed: self.on_closed.clone(),
            on_half_opened: self.on_half_opened.clone(),
            telemetry: self.telemetry.clone(),
        });

        for control in &self.controls {
            control.attach(&breaker);
        }

        CircuitBreaker {
            shared: Arc::new(CircuitBreakerShared {
                breaker,
                should_handle: self.should_handle.clone(),
            }),
            inner,
        }
    }
}
