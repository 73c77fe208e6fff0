// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyspawn::Spawner;
use futures_util::future::{Either, select};
use layered::Service;
use tick::Clock;

use super::{AbandonedTask, OnTimeout, OnTimeoutArgs, TimeoutLayer, TimeoutProvider, TimeoutProviderArgs};
use crate::telemetry::{OutcomeSummary, Severity, TIMEOUT, TelemetryHelper, events};
use crate::wait::{self, Elapsed};
use crate::{Execution, ExecutionMode, Fault, FaultKind, NotSet, Operation, Outcome, PipelineOptions, ResilienceContext, deadlines};

/// Bounds how long the inner strategies may run.
///
/// Each execution runs under a child of the caller's cancellation token. When the timeout
/// elapses, the child token is cancelled and the call fails with [`Fault::TimedOut`]. If the
/// caller cancelled first, the call fails with [`Fault::Cancelled`] instead.
///
/// How the caller waits depends on the discipline chosen on the [`TimeoutLayer`]: cooperative
/// timeouts stop the inner execution, abandon-and-race timeouts leave it running.
///
/// Configure it with [`Timeout::layer`].
#[derive(Debug)]
pub struct Timeout<T, S> {
    pub(super) shared: Arc<TimeoutShared<T>>,
    pub(super) inner: Arc<S>,
}

#[derive(Debug)]
pub(crate) struct TimeoutShared<T> {
    pub(crate) clock: Clock,
    pub(crate) timeout: Duration,
    pub(crate) provider: Option<TimeoutProvider>,
    pub(crate) discipline: Discipline,
    pub(crate) on_timeout: Option<OnTimeout<T>>,
    pub(crate) telemetry: TelemetryHelper,
}

#[derive(Debug, Clone)]
pub(crate) enum Discipline {
    Cooperative,
    AbandonAndRace(Spawner),
}

impl<T, S> Clone for Timeout<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Timeout<T, ()> {
    /// Starts configuring a timeout named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, options: &PipelineOptions<T>) -> TimeoutLayer<T, NotSet> {
        TimeoutLayer::new(name.into(), options)
    }
}

enum Race<T> {
    Finished(Outcome<T>),
    Expired(Option<AbandonedTask<T>>),
}

impl<T, O, S> Service<Execution<T, O>> for Timeout<T, S>
where
    T: Send + 'static,
    O: Operation<T>,
    S: Service<Execution<T, O>, Out = Outcome<T>> + 'static,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let shared = &*self.shared;
        let parent = execution.context().clone();

        let timeout = shared.timeout_for(&parent);
        if timeout.is_zero() {
            return self.inner.execute(execution).await;
        }

        let child = parent.child();
        let execution = execution.with_context(child.clone());
        let elapsed = Elapsed::start(&shared.clock, parent.execution_mode());

        let race = match &shared.discipline {
            Discipline::Cooperative => self.cooperative(execution, &parent, &child, timeout).await,
            Discipline::AbandonAndRace(spawner) => match AbandonedTask::start(spawner, Arc::clone(&self.inner), execution.clone()) {
                Ok(task) => self.abandon_and_race(task, &parent, &child, timeout).await?,
                Err(error) => {
                    // The operation still runs, bounded the way a cooperative timeout bounds it.
                    tracing::error!(error = %error, "unable to start the thread for an abandoned operation");
                    self.cooperative(execution, &parent, &child, timeout).await
                }
            },
        };

        match race {
            Race::Finished(outcome) => outcome,
            Race::Expired(_) if parent.is_cancelled() => Err(Fault::Cancelled),
            Race::Expired(abandoned) => Err(shared.timed_out(parent, timeout, elapsed.get(), abandoned)),
        }
    }
}

impl<T: Send + 'static, S> Timeout<T, S> {
    async fn cooperative<O>(
        &self,
        execution: Execution<T, O>,
        parent: &ResilienceContext,
        child: &ResilienceContext,
        timeout: Duration,
    ) -> Race<T>
    where
        O: Operation<T>,
        S: Service<Execution<T, O>, Out = Outcome<T>>,
    {
        let mode = child.execution_mode();

        // A blocking operation never yields, so its token is cancelled from the deadline thread.
        let _deadline = match mode {
            ExecutionMode::Synchronous => Instant::now()
                .checked_add(timeout)
                .map(|deadline| deadlines::cancel_at(deadline, child.cancellation().clone())),
            ExecutionMode::Asynchronous => None,
        };

        let future = pin!(self.inner.execute(execution));

        match wait::race(&self.shared.clock, mode, future, timeout).await {
            // The deadline thread cancelled a blocking operation that ran to completion.
            Ok(_) if child.is_cancelled() && !parent.is_cancelled() => Race::Expired(None),
            Ok(outcome) => Race::Finished(outcome),
            Err(_) => {
                child.cancellation().cancel();
                Race::Expired(None)
            }
        }
    }

    async fn abandon_and_race(
        &self,
        mut task: AbandonedTask<T>,
        parent: &ResilienceContext,
        child: &ResilienceContext,
        timeout: Duration,
    ) -> Result<Race<T>, Fault> {
        // The operation may ignore its token, so the caller's cancellation is raced directly.
        let cancelled = pin!(parent.cancellation().cancelled());
        let finished = match wait::race(&self.shared.clock, child.execution_mode(), select(&mut task, cancelled), timeout).await {
            Ok(Either::Left((outcome, _))) => Some(outcome),
            Ok(Either::Right(_)) | Err(_) => None,
        };

        if finished.is_none() && parent.is_cancelled() {
            // Dropping the task detaches the operation.
            return Err(Fault::Cancelled);
        }

        Ok(match finished {
            Some(outcome) => Race::Finished(outcome),
            None => {
                child.cancellation().cancel();
                Race::Expired(task.is_running().then_some(task))
            }
        })
    }
}

impl<T> TimeoutShared<T> {
    fn timeout_for(&self, context: &ResilienceContext) -> Duration {
        self.provider
            .as_ref()
            .and_then(|provider| {
                provider.call(
                    context,
                    TimeoutProviderArgs {
                        default_timeout: self.timeout,
                    },
                )
            })
            .unwrap_or(self.timeout)
    }

    fn timed_out(&self, context: ResilienceContext, timeout: Duration, elapsed: Duration, abandoned: Option<AbandonedTask<T>>) -> Fault {
        self.telemetry.report(
            events::TIMEOUT,
            Severity::Error,
            &context,
            Some(OutcomeSummary::Fault(FaultKind::TimedOut)),
            &[(TIMEOUT, timeout.into())],
        );

        if let Some(on_timeout) = &self.on_timeout {
            on_timeout.call(OnTimeoutArgs {
                context,
                timeout,
                elapsed,
                abandoned,
            });
        }

        Fault::TimedOut { timeout }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::future::pending;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use tick::ClockControl;
    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::Pipeline;
    use crate::telemetry::AttributeValue;
    use crate::testing::{EventRecorder, LogCapture};
    use crate::timeout::abandoned::REFUSE_THREADS;

    fn auto_clock() -> Clock {
        ClockControl::default().auto_advance_timers(true).to_clock()
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Timeout<String, ()>: Send, Sync, Clone, std::fmt::Debug);
    }

    #[tokio::test]
    async fn fast_operation_passes_through() {
        let options = PipelineOptions::new(auto_clock());
        let pipeline = Pipeline::builder(&options)
            .add(Timeout::layer("timeout", &options).timeout(Duration::from_secs(1)))
            .build();

        let outcome = pipeline.execute(&ResilienceContext::new(), |_| async { Ok(42) }).await;

        assert_eq!(outcome.unwrap(), 42);
    }

    #[tokio::test]
    async fn cooperative_timeout_cancels_inner_token() {
        let recorder = EventRecorder::new();
        let options = PipelineOptions::<()>::new(auto_clock()).listener(recorder.listener());
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let pipeline = Pipeline::builder(&options)
            .add(Timeout::layer("timeout", &options).timeout(Duration::from_secs(1)))
            .build();

        let outcome = pipeline
            .execute(&ResilienceContext::new(), move |context| {
                *slot.lock().unwrap() = Some(context);
                pending()
            })
            .await;

        assert!(matches!(outcome, Err(Fault::TimedOut { timeout }) if timeout == Duration::from_secs(1)));
        assert!(seen.lock().unwrap().as_ref().unwrap().is_cancelled());

        let events = recorder.events();
        assert_eq!(recorder.names(), vec![events::TIMEOUT]);
        assert_eq!(events[0].severity(), Severity::Error);
        assert_eq!(events[0].attribute(TIMEOUT), Some(&AttributeValue::from(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn caller_cancellation_wins_over_timeout() {
        let recorder = EventRecorder::new();
        let options = PipelineOptions::<()>::new(auto_clock()).listener(recorder.listener());
        let pipeline = Pipeline::builder(&options)
            .add(Timeout::layer("timeout", &options).timeout(Duration::from_secs(1)))
            .build();
        let context = ResilienceContext::new();
        let token = context.cancellation().clone();

        let outcome = pipeline
            .execute(&context, move |_| {
                token.cancel();
                pending()
            })
            .await;

        assert!(matches!(outcome, Err(Fault::Cancelled)));
        assert!(recorder.names().is_empty());
    }

    #[tokio::test]
    async fn provider_overrides_and_disables() {
        let clock = auto_clock();
        let options = PipelineOptions::<()>::new(clock.clone());
        let pipeline = Pipeline::builder(&options)
            .add(
                Timeout::layer("timeout", &options)
                    .timeout(Duration::from_secs(1))
                    .timeout_provider(|context, args| match context.operation_key() {
                        Some("unbounded") => Some(Duration::ZERO),
                        Some("short") => Some(args.default_timeout() / 10),
                        _ => None,
                    }),
            )
            .build();

        let slow = move |_| {
            let clock = clock.clone();
            async move {
                clock.delay(Duration::from_secs(10)).await;
                Ok(())
            }
        };

        let unbounded = pipeline
            .execute(&ResilienceContext::new().with_operation_key("unbounded"), slow.clone())
            .await;
        let short = pipeline.execute(&ResilienceContext::new().with_operation_key("short"), slow).await;

        assert!(unbounded.is_ok());
        assert!(matches!(short, Err(Fault::TimedOut { timeout }) if timeout == Duration::from_millis(100)));
    }

    #[test]
    fn blocking_operation_observes_deadline() {
        let options = PipelineOptions::<bool>::new(Clock::new_frozen());
        let pipeline = Pipeline::builder(&options)
            .add(Timeout::layer("timeout", &options).timeout(Duration::from_millis(20)))
            .build();
        let observed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed);
        let started = Instant::now();

        let outcome = pipeline.execute_blocking(&ResilienceContext::new(), move |context| {
            while !context.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
                thread::sleep(Duration::from_millis(1));
            }
            flag.store(context.is_cancelled(), Ordering::SeqCst);
            Ok(true)
        });

        assert!(matches!(outcome, Err(Fault::TimedOut { .. })));
        assert!(observed.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn blocking_operation_ignoring_token_reports_after_return() {
        let options = PipelineOptions::<()>::new(Clock::new_frozen());
        let elapsed = Arc::new(Mutex::new(Duration::ZERO));
        let sink = Arc::clone(&elapsed);
        let pipeline = Pipeline::builder(&options)
            .add(
                Timeout::layer("timeout", &options)
                    .timeout(Duration::from_millis(10))
                    .on_timeout(move |args| {
                        assert!(!args.has_abandoned());
                        *sink.lock().unwrap() = args.elapsed();
                    }),
            )
            .build();

        let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |_| {
            thread::sleep(Duration::from_millis(50));
            Ok(())
        });

        assert!(matches!(outcome, Err(Fault::TimedOut { .. })));
        assert!(*elapsed.lock().unwrap() >= Duration::from_millis(50));
    }

    #[test]
    fn refused_thread_degrades_to_cooperative_timeout() {
        let capture = LogCapture::new();
        let _guard = capture.subscriber().set_default();
        let options = PipelineOptions::<bool>::new(Clock::new_frozen());
        let abandoned = Arc::new(AtomicBool::new(false));
        let sink = Arc::clone(&abandoned);
        let pipeline = Pipeline::builder(&options)
            .add(
                Timeout::layer("timeout", &options)
                    .timeout(Duration::from_millis(20))
                    .abandon_and_race(Spawner::new_tokio())
                    .on_timeout(move |args| sink.store(args.has_abandoned(), Ordering::SeqCst)),
            )
            .build();
        let started = Instant::now();

        REFUSE_THREADS.set(true);
        let outcome = pipeline.execute_blocking(&ResilienceContext::new(), move |context| {
            while !context.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(context.is_cancelled())
        });
        REFUSE_THREADS.set(false);

        assert!(matches!(outcome, Err(Fault::TimedOut { .. })));
        assert!(!abandoned.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(5));
        capture.assert_contains("unable to start the thread for an abandoned operation");
        capture.assert_contains("thread creation refused");
    }

    #[tokio::test]
    async fn abandoned_async_operation_keeps_running() {
        let options = PipelineOptions::<u32>::new(Clock::new_tokio());
        let (sender, receiver) = futures_channel::oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let pipeline = Pipeline::builder(&options)
            .add(
                Timeout::layer("timeout", &options)
                    .timeout(Duration::from_millis(20))
                    .abandon_and_race(Spawner::new_tokio())
                    .on_timeout(move |mut args| {
                        if let (Some(task), Some(sender)) = (args.take_abandoned(), sender.lock().unwrap().take()) {
                            let _ = sender.send(task);
                        }
                    }),
            )
            .build();
        let started = Instant::now();

        let outcome = pipeline
            .execute(&ResilienceContext::new(), |_| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(5)
            })
            .await;

        assert!(matches!(outcome, Err(Fault::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_millis(200));

        let task = receiver.await.unwrap();
        assert_eq!(task.await.unwrap(), 5);
    }

    #[test]
    fn abandoned_blocking_operation_keeps_running() {
        let options = PipelineOptions::<u32>::new(Clock::new_frozen());
        let (sender, receiver) = std::sync::mpsc::channel();
        let sender = Mutex::new(sender);
        let pipeline = Pipeline::builder(&options)
            .add(
                Timeout::layer("timeout", &options)
                    .timeout(Duration::from_millis(20))
                    .abandon_and_race(Spawner::new_tokio())
                    .on_timeout(move |mut args| {
                        if let Some(task) = args.take_abandoned() {
                            let _ = sender.lock().unwrap().send(task);
                        }
                    }),
            )
            .build();
        let started = Instant::now();

        let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |_| {
            thread::sleep(Duration::from_millis(200));
            Ok(9)
        });

        assert!(matches!(outcome, Err(Fault::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(receiver.recv().unwrap().wait().unwrap(), 9);
    }

    #[test]
    fn abandoned_operation_finishing_in_time_returns_outcome() {
        let options = PipelineOptions::<u32>::new(Clock::new_frozen());
        let pipeline = Pipeline::builder(&options)
            .add(
                Timeout::layer("timeout", &options)
                    .timeout(Duration::from_secs(5))
                    .abandon_and_race(Spawner::new_tokio()),
            )
            .build();

        assert_eq!(pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok(3)).unwrap(), 3);
    }
}
