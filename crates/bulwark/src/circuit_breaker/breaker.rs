// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::engine::{Engine, Enter, Transition};
use super::{
    CircuitState, HealthInfo, OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs, OnClosed, OnHalfOpened, OnOpened,
};
use crate::telemetry::{AttributeValue, MANUAL, OPEN_DURATION, OutcomeSummary, RETRY_AFTER, Severity, TelemetryHelper, events};
use crate::{Fault, ResilienceContext};

/// The state machine of one breaker with its observers.
///
/// Shared by the service and every [`CircuitBreakerControl`][super::CircuitBreakerControl] it is
/// attached to.
#[derive(Debug)]
pub(crate) struct Breaker {
    pub(crate) engine: Engine,
    pub(crate) on_opened: Option<OnOpened>,
    pub(crate) on_closed: Option<OnClosed>,
    pub(crate) on_half_opened: Option<OnHalfOpened>,
    pub(crate) telemetry: TelemetryHelper,
}

impl Breaker {
    /// Admits an execution; `Ok(true)` marks the half-open probe.
    pub(crate) fn enter(&self, context: &ResilienceContext) -> Result<bool, Fault> {
        let (enter, transition) = self.engine.enter();
        self.notify(transition, context, None);

        match enter {
            Enter::Accepted { probe } => Ok(probe),
            Enter::Rejected(fault) => {
                let attributes: Vec<(&'static str, AttributeValue)> = match fault.retry_after() {
                    Some(retry_after) => vec![(RETRY_AFTER, retry_after.into())],
                    None => Vec::new(),
                };
                self.telemetry.report(
                    events::CIRCUIT_REJECTED,
                    Severity::Error,
                    context,
                    Some(OutcomeSummary::Fault(fault.kind())),
                    &attributes,
                );
                Err(fault)
            }
        }
    }

    pub(crate) fn isolate(&self) {
        let transition = self.engine.isolate();
        self.notify(transition, &ResilienceContext::new(), None);
    }

    pub(crate) fn reset(&self) {
        let transition = self.engine.reset();
        self.notify(transition, &ResilienceContext::new(), None);
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.engine.state()
    }

    pub(crate) fn health(&self) -> HealthInfo {
        self.engine.health()
    }

    /// Reports a transition. Must run without the engine lock held.
    pub(crate) fn notify(&self, transition: Transition, context: &ResilienceContext, outcome: Option<OutcomeSummary>) {
        match transition {
            Transition::None => {}
            Transition::Opened { health, manual } => {
                self.telemetry
                    .report(events::CIRCUIT_OPENED, Severity::Error, context, outcome, &[(MANUAL, manual.into())]);

                if let Some(on_opened) = &self.on_opened {
                    on_opened.call(OnCircuitOpenedArgs {
                        break_duration: self.engine.break_duration(),
                        health,
                        outcome,
                        manual,
                    });
                }
            }
            Transition::HalfOpened { open_duration } => {
                self.telemetry.report(
                    events::CIRCUIT_HALF_OPENED,
                    Severity::Warning,
                    context,
                    None,
                    &[(OPEN_DURATION, open_duration.into())],
                );

                if let Some(on_half_opened) = &self.on_half_opened {
                    on_half_opened.call(OnCircuitHalfOpenedArgs { open_duration });
                }
            }
            Transition::Closed { open_duration, manual } => {
                self.telemetry.report(
                    events::CIRCUIT_CLOSED,
                    Severity::Information,
                    context,
                    outcome,
                    &[(OPEN_DURATION, open_duration.into()), (MANUAL, manual.into())],
                );

                if let Some(on_closed) = &self.on_closed {
                    on_closed.call(OnCircuitClosedArgs { open_duration, manual });
                }
            }
        }
    }
}
