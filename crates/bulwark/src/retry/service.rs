// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use layered::Service;
use recoverable::Recovery;
use tick::Clock;

use super::backoff::{BackoffOptions, BackoffSchedule};
use super::{DelayArgs, DelayGenerator, OnRetry, OnRetryArgs, RetryLayer};
use crate::options::{AttemptLimit, ShouldHandle};
use crate::telemetry::{ATTEMPT_INDEX, ATTEMPT_IS_LAST, OutcomeSummary, RETRY_DELAY, Severity, TelemetryHelper, events};
use crate::{Attempt, Execution, Fault, Operation, Outcome, PipelineOptions, ResilienceContext, wait};

/// Runs the operation again when it produces a handled outcome.
///
/// Each retry waits for a delay computed from the configured backoff, a custom generator or the
/// recovery hint carried by the fault. The wait observes the call's cancellation token: a
/// cancellation ends the loop with [`Fault::Cancelled`] right away. Cancelled outcomes are
/// returned as they are and never retried.
///
/// Configure it with [`Retry::layer`]. For examples, see the [retry module][crate::retry]
/// documentation.
#[derive(Debug)]
pub struct Retry<T, S> {
    pub(super) shared: Arc<RetryShared<T>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct RetryShared<T> {
    pub(crate) clock: Clock,
    pub(crate) attempts: AttemptLimit,
    pub(crate) backoff: BackoffOptions,
    pub(crate) should_handle: ShouldHandle<T>,
    pub(crate) delay_generator: Option<DelayGenerator<T>>,
    pub(crate) on_retry: Option<OnRetry<T>>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<T, S: Clone> Clone for Retry<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<T> Retry<T, ()> {
    /// Starts configuring a retry strategy named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<T>) -> RetryLayer<T> {
        RetryLayer::new(name.into(), options)
    }
}

struct NextAttempt {
    attempt: Attempt,
    delay: Duration,
}

impl<T, O, S> Service<Execution<T, O>> for Retry<T, S>
where
    T: Send + 'static,
    O: Operation<T>,
    S: Service<Execution<T, O>, Out = Outcome<T>>,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let shared = &*self.shared;
        let context = execution.context().clone();
        let mut attempt = shared.attempts.first();
        let mut schedule = shared.backoff.schedule();

        loop {
            let outcome = self.inner.execute(execution.clone()).await;

            let next = match shared.evaluate(&outcome, attempt, &context, &mut schedule) {
                ControlFlow::Continue(next) => next,
                ControlFlow::Break(()) => return outcome,
            };

            wait::delay(&shared.clock, &context, next.delay).await?;

            if let Some(on_retry) = &shared.on_retry {
                on_retry.call(
                    &outcome,
                    OnRetryArgs {
                        attempt,
                        retry_delay: next.delay,
                        context: context.clone(),
                    },
                );
            }

            attempt = next.attempt;
        }
    }
}

impl<T> RetryShared<T> {
    fn evaluate(
        &self,
        outcome: &Outcome<T>,
        attempt: Attempt,
        context: &ResilienceContext,
        schedule: &mut BackoffSchedule<'_>,
    ) -> ControlFlow<(), NextAttempt> {
        if matches!(outcome, Err(Fault::Cancelled)) || context.is_cancelled() {
            return ControlFlow::Break(());
        }

        let handled = self.should_handle.call(outcome);
        self.telemetry.report(
            events::EXECUTION_ATTEMPT,
            if handled { Severity::Warning } else { Severity::Information },
            context,
            Some(OutcomeSummary::of(outcome)),
            &[(ATTEMPT_INDEX, attempt.index().into()), (ATTEMPT_IS_LAST, attempt.is_last().into())],
        );

        if !handled {
            return ControlFlow::Break(());
        }

        let Some(next) = attempt.next(self.attempts) else {
            return ControlFlow::Break(());
        };

        let delay = self.retry_delay(outcome, attempt, schedule);
        self.telemetry.report(
            events::RETRY,
            Severity::Warning,
            context,
            Some(OutcomeSummary::of(outcome)),
            &[(ATTEMPT_INDEX, attempt.index().into()), (RETRY_DELAY, delay.into())],
        );

        ControlFlow::Continue(NextAttempt { attempt: next, delay })
    }

    /// Generator first, then the fault's recovery hint, then the backoff.
    fn retry_delay(&self, outcome: &Outcome<T>, attempt: Attempt, schedule: &mut BackoffSchedule<'_>) -> Duration {
        let backoff_delay = schedule.next_delay();

        let generated = self.delay_generator.as_ref().and_then(|generator| {
            generator.call(
                outcome,
                DelayArgs {
                    attempt,
                    backoff_delay,
                },
            )
        });

        let hinted = || outcome.as_ref().err().and_then(|fault| fault.recovery().get_delay());

        generated
            .or_else(hinted)
            .map_or(backoff_delay, |delay| self.backoff.clamp(delay))
    }
}
