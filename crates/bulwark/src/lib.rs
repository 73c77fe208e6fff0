// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Composable fault handling for unreliable operations.
//!
//! `bulwark` wraps a caller-supplied operation in a [`Pipeline`] of resilience strategies and runs
//! it the same way whether the operation is asynchronous or blocking. Strategies are independent
//! [`layered::Service`] implementations linked once, outermost first, when the pipeline is built:
//!
//! - [`retry`]: runs the operation again after handled faults, with backoff and jitter.
//! - [`circuit_breaker`]: stops calling an operation whose failure rate is too high.
//! - [`timeout`]: bounds execution time, cooperatively or by abandoning the operation.
//! - [`concurrency_limiter`]: caps concurrent executions with an optional wait queue.
//! - [`rate_limiter`]: admits executions through a lease-based rate limiter.
//! - [`fallback`]: replaces handled faults with an alternative outcome.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::{Fallback, Fault, Pipeline, PipelineOptions, ResilienceContext, Retry, Timeout};
//! use tick::Clock;
//!
//! let options = PipelineOptions::new(Clock::new_frozen()).name("inventory");
//!
//! let pipeline = Pipeline::builder(&options)
//!     .add(Fallback::layer("fallback", &options).fallback(|_, _| Ok(0)))
//!     .add(Retry::layer("retry", &options).max_retry_attempts(2).base_delay(Duration::ZERO))
//!     .add(Timeout::layer("timeout", &options).timeout(Duration::from_secs(1)))
//!     .build();
//!
//! let stock = pipeline.execute_blocking(&ResilienceContext::new(), |_| {
//!     Err::<u32, _>(Fault::application("inventory service unavailable"))
//! });
//!
//! assert_eq!(stock.unwrap(), 0);
//! ```
//!
//! # Outcomes and Faults
//!
//! Every execution produces an [`Outcome<T>`], a `Result<T, Fault>`. [`Fault`] separates the
//! faults raised by strategies (timeouts, open circuits, rejections) from application errors.
//! [`Fault::Cancelled`] is special: it is never retried, replaced or counted as a failure.
//! `Fault` implements [`Recovery`], so the retry-after hint of a rejection drives the next retry
//! delay.
//!
//! # Execution Modes
//!
//! [`Pipeline::execute`] drives the chain asynchronously; strategy waits are timers of the
//! pipeline [`Clock`][tick::Clock], so tests can control time with `tick::ClockControl`.
//! [`Pipeline::execute_blocking`] drives the same chain on the calling thread and parks it while
//! strategies wait.
//!
//! # Cancellation
//!
//! Each call carries a [`ResilienceContext`] whose [`CancellationToken`] is observed by every
//! strategy after each wait and handed to the operation. Cancelling it ends the call with
//! [`Fault::Cancelled`].
//!
//! # Telemetry
//!
//! Strategies report events through `tracing`, OpenTelemetry metrics (feature `metrics`) and
//! [`TelemetryListener`]s. See the [`telemetry`] module.
//!
//! # Features
//!
//! - `metrics`: enables `PipelineOptions::use_metrics`.
//! - `tokio`: enables the Tokio spawner and clock constructors of the `anyspawn` and `tick`
//!   dependencies.

pub mod circuit_breaker;
pub mod concurrency_limiter;
mod context;
mod deadlines;
pub mod fallback;
mod fault;
mod options;
mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod telemetry;
pub mod timeout;
mod wait;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerControl, CircuitState, HealthInfo};
pub use concurrency_limiter::ConcurrencyLimiter;
pub use context::{ContextPool, ExecutionMode, PooledContext, PropertyKey, ResilienceContext};
pub use fallback::Fallback;
pub use fault::{BoxError, Fault, FaultKind, Outcome};
pub use options::{Attempt, NotSet, PipelineOptions, Set};
pub use pipeline::{AsyncOperation, BlockingOperation, Execution, Invoke, Operation, Pipeline, PipelineBuilder};
pub use rate_limiter::{LeaseLimiter, RateLimitLease, RateLimiter, TokenBucketLimiter};
#[doc(inline)]
pub use recoverable::{Recovery, RecoveryInfo};
pub use retry::{Backoff, Retry};
pub use telemetry::{ResilienceEvent, TelemetryListener};
pub use timeout::{AbandonedTask, Timeout};
#[doc(inline)]
pub use tokio_util::sync::CancellationToken;
