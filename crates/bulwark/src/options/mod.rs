// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;

use tick::Clock;

use crate::telemetry::{Listener, TelemetryHelper, TelemetryListener};
use crate::{Fault, Outcome};

mod attempt;
mod define_fn_wrapper;

pub use attempt::Attempt;
pub(crate) use attempt::AttemptLimit;
pub(crate) use define_fn_wrapper::define_fn_wrapper;

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Marks a required builder property as configured.
#[non_exhaustive]
#[derive(Debug)]
pub struct Set;

/// Marks a required builder property as not configured yet.
#[non_exhaustive]
#[derive(Debug)]
pub struct NotSet;

define_fn_wrapper!(ShouldHandle<T>(Fn(&Outcome<T>) -> bool));

impl<T> ShouldHandle<T> {
    /// Handles every fault except cancellation.
    pub(crate) fn faults() -> Self {
        Self::new(|outcome| matches!(outcome, Err(fault) if !matches!(fault, Fault::Cancelled)))
    }
}

/// Settings shared by every strategy of a pipeline.
///
/// The options provide the clock used for timers, the pipeline name reported in telemetry and
/// the telemetry channels. They are passed by reference to each strategy's `layer` function,
/// which also fixes the result type `T` of the pipeline.
///
/// # Examples
///
/// ```
/// use bulwark::PipelineOptions;
/// use tick::Clock;
///
/// let options = PipelineOptions::<String>::new(Clock::new_frozen())
///     .name("inventory")
///     .use_logs();
/// # let _ = options;
/// ```
#[non_exhaustive]
pub struct PipelineOptions<T> {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    logs_enabled: bool,
    listener: Option<Listener>,
    _out: PhantomData<fn() -> T>,
}

impl<T> PipelineOptions<T> {
    /// Creates options using `clock` for every timer of the pipeline.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            logs_enabled: false,
            listener: None,
            _out: PhantomData,
        }
    }

    /// Sets the pipeline name reported in telemetry.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Reports resilience events to the `resilience.event` counter of `provider`.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn use_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::telemetry::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Writes resilience events as `tracing` events.
    #[must_use]
    pub fn use_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Delivers resilience events to `listener`.
    #[must_use]
    pub fn listener(self, listener: impl TelemetryListener) -> Self {
        Self {
            listener: Some(Listener::new(listener)),
            ..self
        }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn pipeline_name(&self) -> &Cow<'static, str> {
        &self.name
    }

    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            pipeline_name: self.name.clone(),
            strategy_name,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::telemetry::metrics::create_resilience_event_counter),
            logs_enabled: self.logs_enabled,
            listener: self.listener.clone(),
        }
    }
}

impl<T> Clone for PipelineOptions<T> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            name: self.name.clone(),
            #[cfg(any(feature = "metrics", test))]
            meter: self.meter.clone(),
            logs_enabled: self.logs_enabled,
            listener: self.listener.clone(),
            _out: PhantomData,
        }
    }
}

impl<T> Debug for PipelineOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("name", &self.name)
            .field("logs_enabled", &self.logs_enabled)
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}
