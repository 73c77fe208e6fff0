// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::HealthInfo;
use crate::telemetry::OutcomeSummary;

/// Arguments for the [`on_opened`][super::CircuitBreakerLayer::on_opened] callback.
#[derive(Debug)]
pub struct OnCircuitOpenedArgs {
    pub(super) break_duration: Duration,
    pub(super) health: HealthInfo,
    pub(super) outcome: Option<OutcomeSummary>,
    pub(super) manual: bool,
}

impl OnCircuitOpenedArgs {
    /// How long the circuit rejects executions before allowing a probe.
    ///
    /// An isolated circuit stays open until it is reset, whatever this value is.
    #[must_use]
    pub fn break_duration(&self) -> Duration {
        self.break_duration
    }

    /// Health of the sampling window that tripped the circuit.
    #[must_use]
    pub fn health(&self) -> HealthInfo {
        self.health
    }

    /// The outcome that tripped the circuit, absent when it was isolated manually.
    #[must_use]
    pub fn outcome(&self) -> Option<OutcomeSummary> {
        self.outcome
    }

    /// Returns `true` when the circuit was isolated through a [`CircuitBreakerControl`][super::CircuitBreakerControl].
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.manual
    }
}

/// Arguments for the [`on_closed`][super::CircuitBreakerLayer::on_closed] callback.
#[derive(Debug)]
pub struct OnCircuitClosedArgs {
    pub(super) open_duration: Duration,
    pub(super) manual: bool,
}

impl OnCircuitClosedArgs {
    /// How long the circuit was not closed.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }

    /// Returns `true` when the circuit was reset through a [`CircuitBreakerControl`][super::CircuitBreakerControl].
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.manual
    }
}

/// Arguments for the [`on_half_opened`][super::CircuitBreakerLayer::on_half_opened] callback.
#[derive(Debug)]
pub struct OnCircuitHalfOpenedArgs {
    pub(super) open_duration: Duration,
}

impl OnCircuitHalfOpenedArgs {
    /// How long the circuit was open before the probe.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}
