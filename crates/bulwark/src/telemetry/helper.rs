// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use super::{AttributeValue, ContextSnapshot, Listener, OutcomeSummary, ResilienceEvent, Severity};
use crate::ResilienceContext;

/// Per-strategy telemetry sink created from the pipeline options.
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    pub(crate) logs_enabled: bool,
    pub(crate) listener: Option<Listener>,
}

macro_rules! log_event {
    ($level:expr, $helper:expr, $event_name:expr, $context:expr, $outcome:expr, $attributes:expr) => {
        tracing::event!(
            name: "bulwark.resilience",
            $level,
            resilience.pipeline.name = %$helper.pipeline_name,
            resilience.strategy.name = %$helper.strategy_name,
            resilience.event.name = $event_name,
            resilience.outcome = $outcome,
            resilience.operation.key = $context.operation_key().unwrap_or_default(),
            resilience.attributes = ?$attributes,
        )
    };
}

impl TelemetryHelper {
    pub(crate) fn report(
        &self,
        event_name: &'static str,
        severity: Severity,
        context: &ResilienceContext,
        outcome: Option<OutcomeSummary>,
        attributes: &[(&'static str, AttributeValue)],
    ) {
        #[cfg(any(feature = "metrics", test))]
        self.add_metric(event_name, outcome, attributes);

        if self.logs_enabled {
            self.log(event_name, severity, context, outcome, attributes);
        }

        if let Some(listener) = &self.listener {
            let event = ResilienceEvent {
                pipeline_name: self.pipeline_name.clone(),
                strategy_name: self.strategy_name.clone(),
                event_name,
                severity,
                outcome,
                context: ContextSnapshot::capture(context),
                attributes: attributes.to_vec(),
            };

            if !listener.deliver(&event) {
                tracing::warn!(
                    resilience.pipeline.name = %self.pipeline_name,
                    resilience.strategy.name = %self.strategy_name,
                    resilience.event.name = event_name,
                    "telemetry listener panicked, event dropped"
                );
            }
        }
    }

    #[cfg(any(feature = "metrics", test))]
    fn add_metric(&self, event_name: &'static str, outcome: Option<OutcomeSummary>, attributes: &[(&'static str, AttributeValue)]) {
        use opentelemetry::KeyValue;

        use super::{EVENT_NAME, OUTCOME, PIPELINE_NAME, STRATEGY_NAME, metrics};

        let Some(reporter) = &self.event_reporter else {
            return;
        };

        let mut dimensions = vec![
            KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()),
            KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()),
            KeyValue::new(EVENT_NAME, event_name),
        ];
        if let Some(outcome) = outcome {
            dimensions.push(KeyValue::new(OUTCOME, outcome.as_str()));
        }
        dimensions.extend(attributes.iter().filter_map(|(key, value)| metrics::to_key_value(key, value)));

        reporter.add(1, &dimensions);
    }

    fn log(
        &self,
        event_name: &'static str,
        severity: Severity,
        context: &ResilienceContext,
        outcome: Option<OutcomeSummary>,
        attributes: &[(&'static str, AttributeValue)],
    ) {
        let outcome = outcome.map_or("none", OutcomeSummary::as_str);

        match severity {
            Severity::Debug => log_event!(tracing::Level::DEBUG, self, event_name, context, outcome, attributes),
            Severity::Information => log_event!(tracing::Level::INFO, self, event_name, context, outcome, attributes),
            Severity::Warning => log_event!(tracing::Level::WARN, self, event_name, context, outcome, attributes),
            Severity::Error => log_event!(tracing::Level::ERROR, self, event_name, context, outcome, attributes),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use opentelemetry::KeyValue;
    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::testing::{LogCapture, MetricTester};
    use crate::{FaultKind, PipelineOptions};

    fn helper(options: &PipelineOptions<()>) -> TelemetryHelper {
        options.create_telemetry("strategy".into())
    }

    #[test]
    fn metrics_carry_dimensions() {
        let tester = MetricTester::new();
        let options = PipelineOptions::<()>::new(tick::Clock::new_frozen())
            .name("pipeline")
            .use_metrics(tester.meter_provider());

        helper(&options).report(
            "retry",
            Severity::Warning,
            &ResilienceContext::new(),
            Some(OutcomeSummary::Fault(FaultKind::TimedOut)),
            &[("resilience.attempt.index", 1_u32.into())],
        );

        tester.assert_attributes_contain(&[
            KeyValue::new("resilience.pipeline.name", "pipeline"),
            KeyValue::new("resilience.strategy.name", "strategy"),
            KeyValue::new("resilience.event.name", "retry"),
            KeyValue::new("resilience.outcome", "timed_out"),
            KeyValue::new("resilience.attempt.index", 1_i64),
        ]);
    }

    #[test]
    fn logs_written_when_enabled() {
        let capture = LogCapture::new();
        let _guard = capture.subscriber().set_default();
        let options = PipelineOptions::<()>::new(tick::Clock::new_frozen()).name("logged").use_logs();

        helper(&options).report(
            "timeout",
            Severity::Error,
            &ResilienceContext::new().with_operation_key("orders"),
            None,
            &[],
        );

        capture.assert_contains("ERROR");
        capture.assert_contains("logged");
        capture.assert_contains("timeout");
        capture.assert_contains("orders");
    }

    #[test]
    fn logs_skipped_when_disabled() {
        let capture = LogCapture::new();
        let _guard = capture.subscriber().set_default();
        let options = PipelineOptions::<()>::new(tick::Clock::new_frozen()).name("quiet");

        helper(&options).report("timeout", Severity::Error, &ResilienceContext::new(), None, &[]);

        assert!(!capture.output().contains("quiet"));
    }

    #[test]
    fn listener_receives_event() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let options = PipelineOptions::<()>::new(tick::Clock::new_frozen())
            .listener(move |event: &ResilienceEvent| sink.lock().unwrap().push(event.clone()));

        helper(&options).report(
            "fallback",
            Severity::Warning,
            &ResilienceContext::new(),
            Some(OutcomeSummary::Success),
            &[],
        );

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name(), "fallback");
        assert_eq!(events[0].outcome(), Some(OutcomeSummary::Success));
    }

    #[test]
    fn panicking_listener_is_logged() {
        let capture = LogCapture::new();
        let _guard = capture.subscriber().set_default();
        let options = PipelineOptions::<()>::new(tick::Clock::new_frozen())
            .listener(|_: &ResilienceEvent| panic!("listener failure"));

        helper(&options).report("retry", Severity::Warning, &ResilienceContext::new(), None, &[]);

        capture.assert_contains("telemetry listener panicked");
    }
}
