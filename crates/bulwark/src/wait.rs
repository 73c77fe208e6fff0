// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Waiting primitives shared by the asynchronous and the blocking execution modes.
//!
//! Strategies are written once as async code. When an execution is blocking, the whole chain
//! is driven by [`block_on`] on the caller's thread, and the functions below park that thread
//! instead of registering a timer on the pipeline clock.

use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use futures_util::future::{Either, select};
use futures_util::task::{ArcWake, waker};
use tick::{Clock, Stopwatch};

use crate::{ExecutionMode, Fault, ResilienceContext};

/// Waits for `duration` unless the context is cancelled first.
///
/// Returns [`Fault::Cancelled`] when cancellation was requested before or during the wait.
pub(crate) async fn delay(clock: &Clock, context: &ResilienceContext, duration: Duration) -> Result<(), Fault> {
    if context.is_cancelled() {
        return Err(Fault::Cancelled);
    }

    if !duration.is_zero() {
        let cancelled = pin!(context.cancellation().cancelled());

        let interrupted = match context.execution_mode() {
            ExecutionMode::Synchronous => block_until(cancelled, Instant::now().checked_add(duration)).is_some(),
            ExecutionMode::Asynchronous => matches!(select(pin!(clock.delay(duration)), cancelled).await, Either::Right(_)),
        };

        if interrupted {
            return Err(Fault::Cancelled);
        }
    }

    // The token may flip right as the timer fires.
    if context.is_cancelled() { Err(Fault::Cancelled) } else { Ok(()) }
}

/// Waits for `future` unless the context is cancelled first.
///
/// Blocking executions park the thread until either happens.
pub(crate) async fn or_cancelled<F: Future>(context: &ResilienceContext, future: F) -> Result<F::Output, Fault> {
    if context.is_cancelled() {
        return Err(Fault::Cancelled);
    }

    let future = pin!(future);
    let cancelled = pin!(context.cancellation().cancelled());
    let raced = select(future, cancelled);
    let winner = match context.execution_mode() {
        ExecutionMode::Synchronous => block_on(raced),
        ExecutionMode::Asynchronous => raced.await,
    };

    match winner {
        Either::Left((output, _)) => Ok(output),
        Either::Right(_) => Err(Fault::Cancelled),
    }
}

/// Races `future` against a timer of `timeout`.
///
/// Returns the output when the future wins and gives the unfinished future back otherwise.
pub(crate) async fn race<F>(clock: &Clock, mode: ExecutionMode, mut future: F, timeout: Duration) -> Result<F::Output, F>
where
    F: Future + Unpin,
{
    match mode {
        ExecutionMode::Synchronous => match block_until(Pin::new(&mut future), Instant::now().checked_add(timeout)) {
            Some(output) => Ok(output),
            None => Err(future),
        },
        ExecutionMode::Asynchronous => match select(future, pin!(clock.delay(timeout))).await {
            Either::Left((output, _)) => Ok(output),
            Either::Right(((), future)) => Err(future),
        },
    }
}

/// Measures elapsed time with the clock matching the execution mode.
#[derive(Debug)]
pub(crate) enum Elapsed {
    Clock(Stopwatch),
    Wall(Instant),
}

impl Elapsed {
    pub(crate) fn start(clock: &Clock, mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Synchronous => Self::Wall(Instant::now()),
            ExecutionMode::Asynchronous => Self::Clock(clock.stopwatch()),
        }
    }

    pub(crate) fn get(&self) -> Duration {
        match self {
            Self::Clock(stopwatch) => stopwatch.elapsed(),
            Self::Wall(started) => started.elapsed(),
        }
    }
}

thread_local! {
    static THREAD_WAKER: Waker = waker(Arc::new(Unparker(thread::current())));
}

/// Waker unparking the current thread, created once per thread.
fn thread_waker() -> Waker {
    THREAD_WAKER.with(Waker::clone)
}

/// Drives `future` to completion on the current thread.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = thread_waker();
    let mut cx = Context::from_waker(&waker);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
        thread::park();
    }
}

/// Drives `future` on the current thread until it completes or `deadline` passes.
///
/// A `None` deadline (an instant too far to represent) waits without bound.
pub(crate) fn block_until<F: Future>(mut future: Pin<&mut F>, deadline: Option<Instant>) -> Option<F::Output> {
    let waker = thread_waker();
    let mut cx = Context::from_waker(&waker);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return Some(output);
        }

        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                thread::park_timeout(deadline - now);
            }
            None => thread::park(),
        }
    }
}

struct Unparker(Thread);

impl ArcWake for Unparker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::future::{pending, ready};

    use tick::ClockControl;

    use super::*;

    #[test]
    fn block_on_ready() {
        assert_eq!(block_on(ready(5)), 5);
    }

    #[test]
    fn block_on_woken_from_other_thread() {
        let (tx, rx) = futures_channel::oneshot::channel();

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(9).unwrap();
        });

        assert_eq!(block_on(rx), Ok(9));
        sender.join().unwrap();
    }

    #[test]
    fn block_until_deadline_passes() {
        let future = pin!(pending::<()>());
        let started = Instant::now();

        assert!(block_until(future, Some(started + Duration::from_millis(20))).is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocking_delay_completes() {
        let clock = Clock::new_frozen();
        let context = ResilienceContext::new().with_mode(ExecutionMode::Synchronous);

        let result = block_on(delay(&clock, &context, Duration::from_millis(5)));

        assert!(result.is_ok());
    }

    #[test]
    fn blocking_delay_interrupted_by_cancellation() {
        let clock = Clock::new_frozen();
        let context = ResilienceContext::new().with_mode(ExecutionMode::Synchronous);
        let token = context.cancellation().clone();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            token.cancel();
        });

        let started = Instant::now();
        let result = block_on(delay(&clock, &context, Duration::from_secs(30)));

        assert!(matches!(result, Err(Fault::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
        canceller.join().unwrap();
    }

    #[tokio::test]
    async fn async_delay_uses_clock() {
        let control = ClockControl::default().auto_advance_timers(true);
        let clock = control.to_clock();
        let context = ResilienceContext::new();
        let stopwatch = clock.stopwatch();

        delay(&clock, &context, Duration::from_secs(10)).await.unwrap();

        assert_eq!(stopwatch.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn async_delay_on_cancelled_context() {
        let clock = Clock::new_frozen();
        let context = ResilienceContext::new();
        context.cancellation().cancel();

        let result = delay(&clock, &context, Duration::from_secs(10)).await;

        assert!(matches!(result, Err(Fault::Cancelled)));
    }

    #[tokio::test]
    async fn async_race_timer_wins() {
        let control = ClockControl::default().auto_advance_timers(true);
        let clock = control.to_clock();

        let result = race(&clock, ExecutionMode::Asynchronous, pending::<()>(), Duration::from_secs(1)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn or_cancelled_returns_output() {
        let context = ResilienceContext::new();

        assert_eq!(or_cancelled(&context, ready(4)).await.ok(), Some(4));
    }

    #[test]
    fn blocking_or_cancelled_interrupted() {
        let context = ResilienceContext::new().with_mode(ExecutionMode::Synchronous);
        let token = context.cancellation().clone();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            token.cancel();
        });

        let result = block_on(or_cancelled(&context, pending::<()>()));

        assert!(matches!(result, Err(Fault::Cancelled)));
        canceller.join().unwrap();
    }

    #[test]
    fn blocking_race_future_wins() {
        let clock = Clock::new_frozen();

        let result = block_on(race(&clock, ExecutionMode::Synchronous, ready(3), Duration::from_secs(1)));

        assert_eq!(result.ok(), Some(3));
    }

    #[test]
    fn elapsed_uses_wall_clock_when_blocking() {
        let clock = Clock::new_frozen();
        let elapsed = Elapsed::start(&clock, ExecutionMode::Synchronous);

        thread::sleep(Duration::from_millis(5));

        assert!(elapsed.get() >= Duration::from_millis(5));
        assert_eq!(Elapsed::start(&clock, ExecutionMode::Asynchronous).get(), Duration::ZERO);
    }
}
