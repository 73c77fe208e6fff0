// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resilience telemetry.
//!
//! Every strategy reports what it does through three channels:
//!
//! - structured `tracing` events, enabled with [`PipelineOptions::use_logs`][crate::PipelineOptions::use_logs];
//! - the `resilience.event` OpenTelemetry counter, enabled with `PipelineOptions::use_metrics`
//!   (requires the `metrics` feature);
//! - a [`TelemetryListener`] registered with [`PipelineOptions::listener`][crate::PipelineOptions::listener],
//!   which receives a [`ResilienceEvent`] per occurrence.
//!
//! A listener that panics never affects the execution: the panic is contained, logged and the
//! event is dropped.
//!
//! # Conventions
//!
//! Attribute keys follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations):
//! dot-separated keys with short `snake_case` values.

mod event;
mod helper;
mod listener;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;

pub use event::{AttributeValue, ContextSnapshot, OutcomeSummary, ResilienceEvent, Severity};
pub(crate) use helper::TelemetryHelper;
pub use listener::TelemetryListener;
pub(crate) use listener::Listener;

/// Key annotating the name of the pipeline, for example `user_auth`.
pub const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key annotating the name of the strategy, for example `retry` or `circuit_breaker`.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key annotating the event being reported, for example `circuit_opened`.
pub const EVENT_NAME: &str = "resilience.event.name";

/// Key annotating the outcome that triggered the event: `success` or a fault kind.
pub const OUTCOME: &str = "resilience.outcome";

/// Key annotating the 0-based index of an execution attempt.
pub const ATTEMPT_INDEX: &str = "resilience.attempt.index";

/// Key annotating whether a retried attempt was the last one allowed.
pub const ATTEMPT_IS_LAST: &str = "resilience.attempt.is_last";

/// Key annotating the delay before the next retry.
pub const RETRY_DELAY: &str = "resilience.retry.delay";

/// Key annotating the timeout that elapsed.
pub const TIMEOUT: &str = "resilience.timeout";

/// Key annotating the time a circuit spent open before it closed.
pub const OPEN_DURATION: &str = "resilience.circuit.open_duration";

/// Key annotating how long a rejected caller should wait.
pub const RETRY_AFTER: &str = "resilience.retry_after";

/// Key annotating whether a circuit transition was requested manually.
pub const MANUAL: &str = "resilience.circuit.manual";

/// Names of the events emitted by the built-in strategies.
pub mod events {
    /// An attempt of a retried execution completed.
    pub const EXECUTION_ATTEMPT: &str = "execution_attempt";
    /// The retry strategy is about to wait and run the operation again.
    pub const RETRY: &str = "retry";
    /// The circuit breaker opened or was isolated.
    pub const CIRCUIT_OPENED: &str = "circuit_opened";
    /// The circuit breaker closed.
    pub const CIRCUIT_CLOSED: &str = "circuit_closed";
    /// The circuit breaker let a probe through.
    pub const CIRCUIT_HALF_OPENED: &str = "circuit_half_opened";
    /// The circuit breaker rejected an execution.
    pub const CIRCUIT_REJECTED: &str = "circuit_rejected";
    /// The timeout strategy gave up waiting.
    pub const TIMEOUT: &str = "timeout";
    /// The concurrency limiter rejected an execution.
    pub const CONCURRENCY_LIMITER_REJECTED: &str = "concurrency_limiter_rejected";
    /// The rate limiter rejected an execution.
    pub const RATE_LIMITER_REJECTED: &str = "rate_limiter_rejected";
    /// The fallback strategy replaced an outcome.
    pub const FALLBACK: &str = "fallback";
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable() {
        assert_eq!(PIPELINE_NAME, "resilience.pipeline.name");
        assert_eq!(STRATEGY_NAME, "resilience.strategy.name");
        assert_eq!(EVENT_NAME, "resilience.event.name");
        assert_eq!(events::CIRCUIT_OPENED, "circuit_opened");
    }
}
