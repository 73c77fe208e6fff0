// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use layered::Service;

use super::breaker::Breaker;
use super::engine::ExitGuard;
use super::health::ExecutionResult;
use super::{CircuitBreakerLayer, CircuitState, HealthInfo};
use crate::options::ShouldHandle;
use crate::telemetry::OutcomeSummary;
use crate::{Execution, Fault, Operation, Outcome, PipelineOptions};

/// Stops calling an operation that keeps failing.
///
/// The breaker records the outcome of every execution over a sliding sampling window. Once the
/// window holds at least the minimum throughput and the failure rate reaches the failure ratio,
/// the circuit opens: executions are rejected with [`Fault::CircuitOpen`] without running the
/// operation. After the break duration one probe execution is let through; its success closes
/// the circuit and its failure opens it again for another break duration.
///
/// A [`CircuitBreakerControl`][super::CircuitBreakerControl] can isolate the circuit, which then
/// rejects every execution with [`Fault::CircuitIsolated`] until it is reset.
///
/// Timestamps always come from the pipeline clock, in both execution modes.
///
/// Configure it with [`CircuitBreaker::layer`].
#[derive(Debug)]
pub struct CircuitBreaker<T, S> {
    pub(super) shared: Arc<CircuitBreakerShared<T>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct CircuitBreakerShared<T> {
    pub(crate) breaker: Arc<Breaker>,
    pub(crate) should_handle: ShouldHandle<T>,
}

impl<T, S: Clone> Clone for CircuitBreaker<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<T> CircuitBreaker<T, ()> {
    /// Starts configuring a circuit breaker named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<T>) -> CircuitBreakerLayer<T> {
        CircuitBreakerLayer::new(name.into(), options)
    }
}

impl<T, S> CircuitBreaker<T, S> {
    /// Current state of the circuit.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.shared.breaker.state()
    }

    /// Health of the current sampling window.
    #[must_use]
    pub fn health(&self) -> HealthInfo {
        self.shared.breaker.health()
    }
}

impl<T, O, S> Service<Execution<T, O>> for CircuitBreaker<T, S>
where
    T: Send + 'static,
    O: Operation<T>,
    S: Service<Execution<T, O>, Out = Outcome<T>>,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let shared = &*self.shared;
        let breaker = &*shared.breaker;
        let context = execution.context().clone();

        let probe = breaker.enter(&context)?;
        let guard = ExitGuard::new(&breaker.engine, probe);

        let outcome = self.inner.execute(execution).await;

        let result = match &outcome {
            Err(Fault::Cancelled) => ExecutionResult::Ignored,
            outcome if shared.should_handle.call(outcome) => ExecutionResult::Failure,
            _ => ExecutionResult::Success,
        };

        let transition = guard.exit(result);
        breaker.notify(transition, &context, Some(OutcomeSummary::of(&outcome)));

        outcome
    }
}
