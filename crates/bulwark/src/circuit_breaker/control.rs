// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::breaker::Breaker;
use super::{CircuitState, HealthInfo};

/// Observes and manually controls circuit breakers.
///
/// Attach the control to one or more breakers with
/// [`CircuitBreakerLayer::control`][super::CircuitBreakerLayer::control]. Clones share the same
/// set of breakers. The control does not keep breakers alive: once a pipeline is dropped, its
/// breakers are forgotten.
///
/// # Examples
///
/// ```
/// use bulwark::circuit_breaker::{CircuitBreaker, CircuitBreakerControl, CircuitState};
/// use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
/// use tick::Clock;
///
/// let control = CircuitBreakerControl::new();
/// let options = PipelineOptions::new(Clock::new_frozen());
/// let pipeline = Pipeline::builder(&options)
///     .add(CircuitBreaker::layer("breaker", &options).control(&control))
///     .build();
///
/// control.isolate();
/// assert_eq!(control.state(), Some(CircuitState::Isolated));
///
/// let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok::<_, Fault>(()));
/// assert!(matches!(outcome, Err(Fault::CircuitIsolated)));
///
/// control.reset();
/// assert_eq!(control.state(), Some(CircuitState::Closed));
/// ```
#[derive(Clone, Default)]
pub struct CircuitBreakerControl {
    breakers: Arc<Mutex<Vec<Weak<Breaker>>>>,
}

impl CircuitBreakerControl {
    /// Creates a control attached to no breaker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of the first attached breaker that is still alive.
    #[must_use]
    pub fn state(&self) -> Option<CircuitState> {
        self.first().map(|breaker| breaker.state())
    }

    /// Health of the first attached breaker that is still alive.
    #[must_use]
    pub fn health(&self) -> Option<HealthInfo> {
        self.first().map(|breaker| breaker.health())
    }

    /// Opens every attached breaker until [`reset`][Self::reset] is called.
    pub fn isolate(&self) {
        for breaker in self.live() {
            breaker.isolate();
        }
    }

    /// Closes every attached breaker and clears its health statistics.
    pub fn reset(&self) {
        for breaker in self.live() {
            breaker.reset();
        }
    }

    pub(crate) fn attach(&self, breaker: &Arc<Breaker>) {
        let mut breakers = self.breakers.lock();
        breakers.retain(|weak| weak.strong_count() > 0);
        breakers.push(Arc::downgrade(breaker));
    }

    fn first(&self) -> Option<Arc<Breaker>> {
        self.breakers.lock().iter().find_map(Weak::upgrade)
    }

    /// Upgrades the breakers so callbacks run without the list locked.
    fn live(&self) -> Vec<Arc<Breaker>> {
        self.breakers.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

impl Debug for CircuitBreakerControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerControl")
            .field("breakers", &self.breakers.lock().len())
            .finish()
    }
}
