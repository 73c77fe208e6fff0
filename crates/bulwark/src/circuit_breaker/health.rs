// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of an execution as recorded by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    Failure,
    /// Not counted, such as a cancellation.
    Ignored,
}

/// Throughput and failure rate over the sampling window of a circuit breaker.
///
/// # Examples
///
/// ```
/// use bulwark::circuit_breaker::CircuitBreakerControl;
///
/// let control = CircuitBreakerControl::new();
/// assert!(control.health().is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HealthInfo {
    throughput: u32,
    failure_rate: f64,
}

impl HealthInfo {
    pub(crate) fn new(successes: u32, failures: u32) -> Self {
        let throughput = successes.saturating_add(failures);

        if throughput == 0 {
            return Self::default();
        }

        Self {
            throughput,
            failure_rate: f64::from(failures) / f64::from(throughput),
        }
    }

    /// Number of recorded executions in the window.
    #[must_use]
    pub fn throughput(&self) -> u32 {
        self.throughput
    }

    /// Share of failed executions in the window, from `0.0` to `1.0`.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    pub(crate) fn is_unhealthy(&self, failure_ratio: f64, minimum_throughput: u32) -> bool {
        self.throughput >= minimum_throughput && self.failure_rate >= failure_ratio
    }
}

/// Number of windows the sampling duration is split into.
const WINDOW_COUNT: u32 = 10;

/// Executions recorded over a sliding time window.
///
/// The sampling duration is split into [`WINDOW_COUNT`] windows, so at most `WINDOW_COUNT + 1`
/// windows are alive whatever the throughput. A window leaves the sample once its start is
/// `sampling_duration` old.
#[derive(Debug)]
pub(crate) struct HealthMetrics {
    sampling_duration: Duration,
    window_duration: Duration,
    windows: VecDeque<Window>,
    successes: u32,
    failures: u32,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    successes: u32,
    failures: u32,
}

impl HealthMetrics {
    pub(crate) fn new(sampling_duration: Duration) -> Self {
        Self {
            sampling_duration,
            window_duration: sampling_duration / WINDOW_COUNT,
            windows: VecDeque::with_capacity(WINDOW_COUNT as usize + 1),
            successes: 0,
            failures: 0,
        }
    }

    pub(crate) fn record(&mut self, result: ExecutionResult, now: Instant) {
        let (successes, failures) = match result {
            ExecutionResult::Success => (1, 0),
            ExecutionResult::Failure => (0, 1),
            ExecutionResult::Ignored => return,
        };

        self.prune(now);

        match self.windows.back_mut() {
            Some(window) if window.started_at == now || now.saturating_duration_since(window.started_at) < self.window_duration => {
                window.successes = window.successes.saturating_add(successes);
                window.failures = window.failures.saturating_add(failures);
            }
            _ => self.windows.push_back(Window {
                started_at: now,
                successes,
                failures,
            }),
        }

        self.successes = self.successes.saturating_add(successes);
        self.failures = self.failures.saturating_add(failures);
    }

    pub(crate) fn health_info(&mut self, now: Instant) -> HealthInfo {
        self.prune(now);
        HealthInfo::new(self.successes, self.failures)
    }

    pub(crate) fn reset(&mut self) {
        self.windows.clear();
        self.successes = 0;
        self.failures = 0;
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.windows.front()
            && now.saturating_duration_since(front.started_at) >= self.sampling_duration
        {
            self.successes = self.successes.saturating_sub(front.successes);
            self.failures = self.failures.saturating_sub(front.failures);
            self.windows.pop_front();
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::float_cmp, reason = "exact fractions")]
    fn health_info_from_counts() {
        let empty = HealthInfo::new(0, 0);
        assert_eq!(empty.throughput(), 0);
        assert_eq!(empty.failure_rate(), 0.0);

        let half = HealthInfo::new(2, 2);
        assert_eq!(half.throughput(), 4);
        assert_eq!(half.failure_rate(), 0.5);
    }

    #[test]
    fn unhealthy_requires_both_thresholds() {
        let health = HealthInfo::new(2, 2);

        assert!(health.is_unhealthy(0.5, 4));
        assert!(!health.is_unhealthy(0.5, 5));
        assert!(!health.is_unhealthy(0.6, 4));
    }

    #[test]
    fn windows_expire_at_sampling_boundary() {
        let start = Instant::now();
        let mut metrics = HealthMetrics::new(Duration::from_secs(10));

        metrics.record(ExecutionResult::Failure, start);
        metrics.record(ExecutionResult::Success, start + Duration::from_secs(5));

        assert_eq!(metrics.health_info(start + Duration::from_millis(9_999)).throughput(), 2);

        let later = metrics.health_info(start + Duration::from_secs(10));
        assert_eq!(later.throughput(), 1);
        assert!(later.failure_rate().abs() < f64::EPSILON);

        assert_eq!(metrics.health_info(start + Duration::from_secs(15)).throughput(), 0);
    }

    #[test]
    fn nearby_results_share_a_window() {
        let now = Instant::now();
        let mut metrics = HealthMetrics::new(Duration::from_secs(1));

        metrics.record(ExecutionResult::Failure, now);
        metrics.record(ExecutionResult::Failure, now);
        metrics.record(ExecutionResult::Success, now + Duration::from_millis(99));

        assert_eq!(metrics.windows.len(), 1);
        assert_eq!(metrics.health_info(now + Duration::from_millis(99)), HealthInfo::new(1, 2));
    }

    #[test]
    fn window_count_is_bounded_by_sampling_duration() {
        let start = Instant::now();
        let mut metrics = HealthMetrics::new(Duration::from_secs(10));

        for millis in 0..60_000 {
            metrics.record(ExecutionResult::Success, start + Duration::from_millis(millis));
            assert!(metrics.windows.len() <= WINDOW_COUNT as usize + 1);
        }

        assert_eq!(metrics.health_info(start + Duration::from_millis(59_999)).throughput(), 10_000);
    }

    #[test]
    fn ignored_results_are_not_counted() {
        let now = Instant::now();
        let mut metrics = HealthMetrics::new(Duration::from_secs(1));

        metrics.record(ExecutionResult::Ignored, now);

        assert_eq!(metrics.health_info(now).throughput(), 0);
    }

    #[test]
    fn reset_clears_counts() {
        let now = Instant::now();
        let mut metrics = HealthMetrics::new(Duration::from_secs(1));
        metrics.record(ExecutionResult::Failure, now);

        metrics.reset();

        assert_eq!(metrics.health_info(now), HealthInfo::default());
    }
}
