// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::{ExecutionMode, FaultKind, Outcome, ResilienceContext};

/// How noteworthy a [`ResilienceEvent`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Expected behavior, such as a circuit closing again.
    Information,
    /// Degraded behavior, such as a retry.
    Warning,
    /// Failure handled by a strategy, such as a timeout or a rejection.
    Error,
}

/// Outcome of an execution reduced to what telemetry needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeSummary {
    /// The execution produced a value.
    Success,
    /// The execution ended with a fault of this kind.
    Fault(FaultKind),
}

impl OutcomeSummary {
    /// Summarizes an outcome.
    #[must_use]
    pub fn of<T>(outcome: &Outcome<T>) -> Self {
        match outcome {
            Ok(_) => Self::Success,
            Err(fault) => Self::Fault(fault.kind()),
        }
    }

    /// Stable, snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fault(kind) => kind.as_str(),
        }
    }
}

impl Display for OutcomeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a [`ResilienceContext`] captured when an event is reported.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    operation_key: Option<Arc<str>>,
    execution_mode: ExecutionMode,
    cancelled: bool,
}

impl ContextSnapshot {
    pub(crate) fn capture(context: &ResilienceContext) -> Self {
        Self {
            operation_key: context.operation_key_shared(),
            execution_mode: context.execution_mode(),
            cancelled: context.is_cancelled(),
        }
    }

    /// The operation key of the execution.
    #[must_use]
    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    /// The mode of the execution.
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    /// Whether cancellation had been requested when the event was reported.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Value of a strategy specific attribute attached to an event.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AttributeValue {
    /// A flag.
    Bool(bool),
    /// An integer, such as an attempt index.
    I64(i64),
    /// A duration, such as a retry delay. Not exported as a metric dimension.
    Duration(Duration),
    /// A short text value.
    Str(Cow<'static, str>),
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<Duration> for AttributeValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<&'static str> for AttributeValue {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

/// A single occurrence reported by a strategy.
///
/// The event identifies its source by pipeline and strategy name, carries the event name (see
/// [`events`][crate::telemetry::events]), a severity, the outcome that caused it when there is one,
/// a snapshot of the execution context and strategy specific attributes.
#[derive(Debug, Clone)]
pub struct ResilienceEvent {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    pub(crate) event_name: &'static str,
    pub(crate) severity: Severity,
    pub(crate) outcome: Option<OutcomeSummary>,
    pub(crate) context: ContextSnapshot,
    pub(crate) attributes: Vec<(&'static str, AttributeValue)>,
}

impl ResilienceEvent {
    /// Name of the pipeline that reported the event.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Name of the strategy that reported the event.
    #[must_use]
    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    /// Name of the event.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// Severity of the event.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Summary of the outcome that caused the event, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<OutcomeSummary> {
        self.outcome
    }

    /// Snapshot of the execution context.
    #[must_use]
    pub fn context(&self) -> &ContextSnapshot {
        &self.context
    }

    /// Strategy specific attributes.
    #[must_use]
    pub fn attributes(&self) -> &[(&'static str, AttributeValue)] {
        &self.attributes
    }

    /// Looks up a strategy specific attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|(name, _)| *name == key).map(|(_, value)| value)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fault;

    #[test]
    fn outcome_summary() {
        assert_eq!(OutcomeSummary::of(&Ok::<_, Fault>(1)), OutcomeSummary::Success);
        assert_eq!(
            OutcomeSummary::of::<()>(&Err(Fault::BulkheadRejected)),
            OutcomeSummary::Fault(FaultKind::BulkheadRejected)
        );
        assert_eq!(OutcomeSummary::Fault(FaultKind::TimedOut).to_string(), "timed_out");
        assert_eq!(OutcomeSummary::Success.to_string(), "success");
    }

    #[test]
    fn snapshot_captures_context() {
        let context = ResilienceContext::new().with_operation_key("orders");
        context.cancellation().cancel();

        let snapshot = ContextSnapshot::capture(&context);

        assert_eq!(snapshot.operation_key(), Some("orders"));
        assert_eq!(snapshot.execution_mode(), ExecutionMode::Asynchronous);
        assert!(snapshot.is_cancelled());
    }

    #[test]
    fn attribute_lookup() {
        let event = ResilienceEvent {
            pipeline_name: "pipeline".into(),
            strategy_name: "retry".into(),
            event_name: "retry",
            severity: Severity::Warning,
            outcome: None,
            context: ContextSnapshot::capture(&ResilienceContext::new()),
            attributes: vec![("resilience.attempt.index", 2_u32.into())],
        };

        assert_eq!(event.attribute("resilience.attempt.index"), Some(&AttributeValue::I64(2)));
        assert_eq!(event.attribute("missing"), None);
        assert_eq!(event.pipeline_name(), "pipeline");
        assert_eq!(event.strategy_name(), "retry");
        assert_eq!(event.severity(), Severity::Warning);
    }
}
