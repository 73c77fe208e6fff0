// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Defaults taken from Polly v8: <https://www.pollydocs.org/strategies/circuit-breaker.html#defaults>

use std::time::Duration;

pub(super) const DEFAULT_FAILURE_RATIO: f64 = 0.1;

pub(super) const DEFAULT_MINIMUM_THROUGHPUT: u32 = 100;

pub(super) const DEFAULT_SAMPLING_DURATION: Duration = Duration::from_secs(30);

pub(super) const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(5);
