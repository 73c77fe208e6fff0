// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tick::Clock;

use super::health::{ExecutionResult, HealthInfo, HealthMetrics};
use crate::Fault;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CircuitState {
    /// Executions pass through and their outcomes are recorded.
    Closed,
    /// Executions are rejected until the break duration elapses.
    Open,
    /// A single probe execution decides whether the circuit closes or opens again.
    HalfOpen,
    /// Executions are rejected until the circuit is reset manually.
    Isolated,
}

impl CircuitState {
    /// Stable, snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
            Self::Isolated => "isolated",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineOptions {
    pub(crate) failure_ratio: f64,
    pub(crate) minimum_throughput: u32,
    pub(crate) sampling_duration: Duration,
    pub(crate) break_duration: Duration,
}

#[derive(Debug)]
pub(crate) enum Enter {
    Accepted { probe: bool },
    Rejected(Fault),
}

/// A state change the caller must report once the lock is released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Transition {
    None,
    Opened { health: HealthInfo, manual: bool },
    HalfOpened { open_duration: Duration },
    Closed { open_duration: Duration, manual: bool },
}

/// The circuit state machine.
///
/// All decisions are taken under one lock; the lock is never held while user code runs.
#[derive(Debug)]
pub(crate) struct Engine {
    inner: Mutex<Inner>,
    options: EngineOptions,
    clock: Clock,
}

#[derive(Debug)]
struct Inner {
    state: State,
    health: HealthMetrics,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    // `None` when the break outlasts what an `Instant` can represent.
    Open { opened_at: Instant, open_until: Option<Instant> },
    HalfOpen { opened_at: Instant, probe_since: Option<Instant> },
    Isolated { opened_at: Instant },
}

impl Engine {
    pub(crate) fn new(options: EngineOptions, clock: Clock) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                health: HealthMetrics::new(options.sampling_duration),
            }),
            options,
            clock,
        }
    }

    pub(crate) fn break_duration(&self) -> Duration {
        self.options.break_duration
    }

    pub(crate) fn enter(&self) -> (Enter, Transition) {
        let now = self.clock.instant();
        let break_duration = self.options.break_duration;
        let mut inner = self.inner.lock();
        let state = inner.state;

        match state {
            State::Closed => (Enter::Accepted { probe: false }, Transition::None),
            State::Open {
                opened_at,
                open_until: Some(open_until),
            } if now >= open_until => {
                inner.state = State::HalfOpen {
                    opened_at,
                    probe_since: Some(now),
                };
                let open_duration = now.saturating_duration_since(opened_at);
                (Enter::Accepted { probe: true }, Transition::HalfOpened { open_duration })
            }
            State::Open { open_until, .. } => (
                Enter::Rejected(Fault::CircuitOpen {
                    retry_after: open_until.map_or(break_duration, |until| until.saturating_duration_since(now)),
                }),
                Transition::None,
            ),
            State::HalfOpen {
                opened_at,
                probe_since,
            } => match probe_since {
                // A probe that never reported back stops blocking the circuit after a break duration.
                Some(since) if now.saturating_duration_since(since) < break_duration => (
                    Enter::Rejected(Fault::CircuitOpen {
                        retry_after: break_duration.saturating_sub(now.saturating_duration_since(since)),
                    }),
                    Transition::None,
                ),
                _ => {
                    inner.state = State::HalfOpen {
                        opened_at,
                        probe_since: Some(now),
                    };
                    (Enter::Accepted { probe: true }, Transition::None)
                }
            },
            State::Isolated { .. } => (Enter::Rejected(Fault::CircuitIsolated), Transition::None),
        }
    }

    pub(crate) fn exit(&self, result: ExecutionResult, probe: bool) -> Transition {
        let now = self.clock.instant();
        let options = self.options;
        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        match inner.state {
            State::Closed => {
                if result == ExecutionResult::Ignored {
                    return Transition::None;
                }

                inner.health.record(result, now);
                let health = inner.health.health_info(now);

                if health.is_unhealthy(options.failure_ratio, options.minimum_throughput) {
                    inner.state = State::Open {
                        opened_at: now,
                        open_until: now.checked_add(options.break_duration),
                    };
                    Transition::Opened { health, manual: false }
                } else {
                    Transition::None
                }
            }
            // Executions admitted before the circuit opened finish after it; their results are stale.
            State::Open { .. } | State::Isolated { .. } => Transition::None,
            State::HalfOpen { .. } if !probe => Transition::None,
            State::HalfOpen { opened_at, .. } => match result {
                ExecutionResult::Success => {
                    inner.health.reset();
                    inner.state = State::Closed;
                    Transition::Closed {
                        open_duration: now.saturating_duration_since(opened_at),
                        manual: false,
                    }
                }
                ExecutionResult::Failure => {
                    inner.state = State::Open {
                        opened_at,
                        open_until: now.checked_add(options.break_duration),
                    };
                    Transition::Opened {
                        health: HealthInfo::new(0, 1),
                        manual: false,
                    }
                }
                ExecutionResult::Ignored => {
                    inner.state = State::HalfOpen {
                        opened_at,
                        probe_since: None,
                    };
                    Transition::None
                }
            },
        }
    }

    pub(crate) fn isolate(&self) -> Transition {
        let now = self.clock.instant();
        let mut inner = self.inner.lock();

        let opened_at = match inner.state {
            State::Isolated { .. } => return Transition::None,
            State::Closed => now,
            State::Open { opened_at, .. } | State::HalfOpen { opened_at, .. } => opened_at,
        };

        inner.state = State::Isolated { opened_at };
        let health = inner.health.health_info(now);
        Transition::Opened { health, manual: true }
    }

    pub(crate) fn reset(&self) -> Transition {
        let now = self.clock.instant();
        let mut inner = self.inner.lock();

        let opened_at = match inner.state {
            State::Closed => return Transition::None,
            State::Open { opened_at, .. } | State::HalfOpen { opened_at, .. } | State::Isolated { opened_at } => opened_at,
        };

        inner.health.reset();
        inner.state = State::Closed;
        Transition::Closed {
            open_duration: now.saturating_duration_since(opened_at),
            manual: true,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        match self.inner.lock().state {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
            State::Isolated { .. } => CircuitState::Isolated,
        }
    }

    pub(crate) fn health(&self) -> HealthInfo {
        let now = self.clock.instant();
        self.inner.lock().health.health_info(now)
    }
}

/// Reports an admitted execution that never completed, so a half-open probe slot is released.
#[derive(Debug)]
pub(crate) struct ExitGuard<'a> {
    engine: &'a Engine,
    probe: bool,
    armed: bool,
}

impl<'a> ExitGuard<'a> {
    pub(crate) fn new(engine: &'a Engine, probe: bool) -> Self {
        Self {
            engine,
            probe,
            armed: true,
        }
    }

    pub(crate) fn exit(mut self, result: ExecutionResult) -> Transition {
        self.armed = false;
        self.engine.exit(result, self.probe)
    }
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.engine.exit(ExecutionResult::Ignored, self.probe);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;

    fn options() -> EngineOptions {
        EngineOptions {
            failure_ratio: 0.5,
            minimum_throughput: 4,
            sampling_duration: Duration::from_secs(10),
            break_duration: Duration::from_secs(5),
        }
    }

    fn engine() -> (ClockControl, Engine) {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());
        (control, engine)
    }

    fn record(engine: &Engine, result: ExecutionResult) -> Transition {
        match engine.enter() {
            (Enter::Accepted { probe }, _) => engine.exit(result, probe),
            (Enter::Rejected(fault), _) => panic!("unexpected rejection: {fault}"),
        }
    }

    fn open(engine: &Engine) {
        for _ in 0..4 {
            record(engine, ExecutionResult::Failure);
        }
        assert_eq!(engine.state(), CircuitState::Open);
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Engine: Send, Sync);
        static_assertions::assert_impl_all!(CircuitState: Send, Sync, Copy, std::fmt::Debug);
    }

    #[test]
    fn opens_at_ratio_and_throughput() {
        let (_, engine) = engine();

        assert_eq!(record(&engine, ExecutionResult::Success), Transition::None);
        assert_eq!(record(&engine, ExecutionResult::Failure), Transition::None);
        assert_eq!(record(&engine, ExecutionResult::Success), Transition::None);

        let transition = record(&engine, ExecutionResult::Failure);

        assert_eq!(
            transition,
            Transition::Opened {
                health: HealthInfo::new(2, 2),
                manual: false
            }
        );
        assert_eq!(engine.state(), CircuitState::Open);
    }

    #[test]
    fn stays_closed_below_throughput() {
        let (_, engine) = engine();

        for _ in 0..3 {
            record(&engine, ExecutionResult::Failure);
        }

        assert_eq!(engine.state(), CircuitState::Closed);
        assert_eq!(engine.health().throughput(), 3);
    }

    #[test]
    fn old_samples_leave_the_window() {
        let (control, engine) = engine();

        for _ in 0..3 {
            record(&engine, ExecutionResult::Failure);
        }
        control.advance(Duration::from_secs(10));
        record(&engine, ExecutionResult::Failure);

        assert_eq!(engine.state(), CircuitState::Closed);
        assert_eq!(engine.health().throughput(), 1);
    }

    #[test]
    fn rejects_while_open() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(2));

        let (enter, transition) = engine.enter();

        assert!(matches!(
            enter,
            Enter::Rejected(Fault::CircuitOpen { retry_after }) if retry_after == Duration::from_secs(3)
        ));
        assert_eq!(transition, Transition::None);
    }

    #[test]
    fn unrepresentable_break_keeps_circuit_open() {
        let control = ClockControl::new();
        let engine = Engine::new(
            EngineOptions {
                break_duration: Duration::MAX,
                ..options()
            },
            control.to_clock(),
        );
        open(&engine);
        control.advance(Duration::from_secs(3600));

        let (enter, transition) = engine.enter();

        assert!(matches!(
            enter,
            Enter::Rejected(Fault::CircuitOpen { retry_after }) if retry_after == Duration::MAX
        ));
        assert_eq!(transition, Transition::None);
        assert_eq!(engine.state(), CircuitState::Open);

        assert_eq!(
            engine.reset(),
            Transition::Closed {
                open_duration: Duration::from_secs(3600),
                manual: true
            }
        );
    }

    #[test]
    fn half_opens_after_break_with_single_probe() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(5));

        let (enter, transition) = engine.enter();
        assert!(matches!(enter, Enter::Accepted { probe: true }));
        assert_eq!(
            transition,
            Transition::HalfOpened {
                open_duration: Duration::from_secs(5)
            }
        );
        assert_eq!(engine.state(), CircuitState::HalfOpen);

        assert!(matches!(engine.enter().0, Enter::Rejected(Fault::CircuitOpen { .. })));
    }

    #[test]
    fn probe_success_closes_and_resets() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(5));
        let _ = engine.enter();
        control.advance(Duration::from_secs(1));

        let transition = engine.exit(ExecutionResult::Success, true);

        assert_eq!(
            transition,
            Transition::Closed {
                open_duration: Duration::from_secs(6),
                manual: false
            }
        );
        assert_eq!(engine.state(), CircuitState::Closed);
        assert_eq!(engine.health().throughput(), 0);
    }

    #[test]
    fn probe_failure_reopens_for_full_break() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(5));
        let _ = engine.enter();

        let transition = engine.exit(ExecutionResult::Failure, true);

        assert!(matches!(transition, Transition::Opened { manual: false, .. }));
        control.advance(Duration::from_millis(4_999));
        assert!(matches!(engine.enter().0, Enter::Rejected(_)));
        control.advance(Duration::from_millis(1));
        assert!(matches!(engine.enter().0, Enter::Accepted { probe: true }));
    }

    #[test]
    fn non_probe_results_ignored_when_half_open() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(5));
        let _ = engine.enter();

        assert_eq!(engine.exit(ExecutionResult::Success, false), Transition::None);
        assert_eq!(engine.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn dropped_probe_releases_slot() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(5));

        let (Enter::Accepted { probe }, _) = engine.enter() else {
            panic!("probe expected");
        };
        drop(ExitGuard::new(&engine, probe));

        assert!(matches!(engine.enter().0, Enter::Accepted { probe: true }));
    }

    #[test]
    fn stale_probe_is_replaced() {
        let (control, engine) = engine();
        open(&engine);
        control.advance(Duration::from_secs(5));
        let _ = engine.enter();

        control.advance(Duration::from_secs(5));

        assert!(matches!(engine.enter().0, Enter::Accepted { probe: true }));
    }

    #[test]
    fn cancelled_results_are_not_recorded() {
        let (_, engine) = engine();

        for _ in 0..10 {
            record(&engine, ExecutionResult::Ignored);
        }

        assert_eq!(engine.health().throughput(), 0);
    }

    #[test]
    fn isolate_and_reset() {
        let (control, engine) = engine();

        assert!(matches!(engine.isolate(), Transition::Opened { manual: true, .. }));
        assert_eq!(engine.isolate(), Transition::None);
        assert!(matches!(engine.enter().0, Enter::Rejected(Fault::CircuitIsolated)));

        control.advance(Duration::from_secs(60));
        assert_eq!(engine.state(), CircuitState::Isolated);

        assert_eq!(
            engine.reset(),
            Transition::Closed {
                open_duration: Duration::from_secs(60),
                manual: true
            }
        );
        assert_eq!(engine.reset(), Transition::None);
        assert!(matches!(engine.enter().0, Enter::Accepted { probe: false }));
    }

    #[test]
    fn results_after_open_are_dropped() {
        let (_, engine) = engine();
        open(&engine);

        assert_eq!(engine.exit(ExecutionResult::Failure, false), Transition::None);
        assert_eq!(engine.state(), CircuitState::Open);
    }

    #[test]
    fn state_names() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(CircuitState::Isolated.as_str(), "isolated");
    }
}
