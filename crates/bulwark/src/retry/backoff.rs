// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::time::Duration;

use super::constants::{DEFAULT_BACKOFF, DEFAULT_BASE_DELAY, DEFAULT_USE_JITTER};

/// Relative spread of a jittered constant or linear delay: the result lies in `[0.75, 1.25]`
/// times the delay.
const JITTER_SPREAD: f64 = 0.5;

/// How the delay between retries grows.
///
/// A zero base delay turns any backoff into immediate retries. With jitter enabled, constant and
/// linear delays are randomized by up to 25% in both directions and exponential delays use
/// decorrelated jitter, which keeps the exponential growth while spreading concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Backoff {
    /// Every retry waits the base delay.
    Constant,

    /// Retry `n` (1-based) waits `n` times the base delay.
    Linear,

    /// Retry `n` (1-based) waits the base delay times `2^(n-1)`.
    Exponential,
}

/// Source of uniform values in `[0, 1)` used for jitter.
#[derive(Clone, Default)]
pub(crate) enum Random {
    #[default]
    Thread,

    #[cfg(test)]
    Fixed(f64),
}

impl Random {
    fn unit(&self) -> f64 {
        match self {
            Self::Thread => fastrand::f64(),
            #[cfg(test)]
            Self::Fixed(value) => *value,
        }
    }
}

impl Debug for Random {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thread => f.write_str("Thread"),
            #[cfg(test)]
            Self::Fixed(value) => write!(f, "Fixed({value})"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BackoffOptions {
    pub(crate) kind: Backoff,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) jitter: bool,
    pub(crate) random: Random,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            kind: DEFAULT_BACKOFF,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            jitter: DEFAULT_USE_JITTER,
            random: Random::default(),
        }
    }
}

impl BackoffOptions {
    /// Starts the delay sequence of one call.
    pub(crate) fn schedule(&self) -> BackoffSchedule<'_> {
        BackoffSchedule {
            options: self,
            retry: 0,
            curve: 0.0,
        }
    }

    pub(crate) fn clamp(&self, delay: Duration) -> Duration {
        self.max_delay.map_or(delay, |max| delay.min(max))
    }
}

/// Delays of one call, computed lazily as retries happen.
#[derive(Debug)]
pub(crate) struct BackoffSchedule<'a> {
    options: &'a BackoffOptions,
    retry: u32,
    // Position on the decorrelated jitter curve reached by the previous retry.
    curve: f64,
}

impl BackoffSchedule<'_> {
    pub(crate) fn next_delay(&mut self) -> Duration {
        let retry = self.retry;
        self.retry = self.retry.saturating_add(1);

        let options = self.options;
        if options.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let delay = match options.kind {
            Backoff::Constant => self.jittered(options.base_delay),
            Backoff::Linear => self.jittered(options.base_delay.saturating_mul(retry.saturating_add(1))),
            Backoff::Exponential if options.jitter => self.decorrelated(retry),
            Backoff::Exponential => seconds(options.base_delay.as_secs_f64() * 2_f64.powi(i32::try_from(retry).unwrap_or(i32::MAX))),
        };

        options.clamp(delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.options.jitter {
            return delay;
        }

        let factor = JITTER_SPREAD.mul_add(self.options.random.unit(), 1.0 - JITTER_SPREAD / 2.0);
        seconds(delay.as_secs_f64() * factor)
    }

    /// Decorrelated jitter ("V2" formula by George Polevoy, as scaled by Polly).
    ///
    /// Each retry samples a point `t = retry + U[0, 1)` on the curve `2^t * tanh(sqrt(4t))` and
    /// waits the distance travelled since the previous point. The medians land near 1, 2, 4, ...
    /// times the base delay while consecutive delays stay uncorrelated.
    fn decorrelated(&mut self, retry: u32) -> Duration {
        const SMOOTHING: f64 = 4.0;
        const MEDIAN_SCALE: f64 = 1.0 / 1.4;

        let t = f64::from(retry) + self.options.random.unit();
        let point = t.exp2() * (SMOOTHING * t).sqrt().tanh();

        if !point.is_finite() {
            self.curve = point;
            return Duration::MAX;
        }

        let travelled = point - self.curve;
        self.curve = point;

        seconds(travelled * MEDIAN_SCALE * self.options.base_delay.as_secs_f64())
    }
}

fn seconds(secs: f64) -> Duration {
    if secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}
