// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retries of operations that fail with transient faults.
//!
//! [`Retry`] runs the rest of the pipeline again while the outcome is handled and attempts
//! remain. [`RetryLayer`] configures it.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::retry::{Backoff, Retry};
//! use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
//! use tick::Clock;
//!
//! let options = PipelineOptions::new(Clock::new_frozen()).name("inventory");
//! let pipeline = Pipeline::builder(&options)
//!     .add(
//!         Retry::layer("retry", &options)
//!             .max_retry_attempts(2)
//!             .backoff(Backoff::Constant)
//!             .base_delay(Duration::from_millis(1))
//!             .should_handle(|outcome| matches!(outcome, Err(Fault::Application(_)))),
//!     )
//!     .build();
//!
//! let stock = pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok::<_, Fault>(42));
//! assert_eq!(stock.unwrap(), 42);
//! ```
//!
//! # Retry Delay
//!
//! The delay before each retry is the first available of:
//!
//! 1. the value returned by [`delay_generator`][RetryLayer::delay_generator];
//! 2. the delay hint of the fault's [`Recovery`][recoverable::Recovery] classification, such as
//!    the retry-after of a rate limiter rejection;
//! 3. the configured [`Backoff`].
//!
//! [`max_delay`][RetryLayer::max_delay] caps all three.
//!
//! # Cancellation
//!
//! Cancellation is checked after every attempt and during every delay. A cancelled call returns
//! [`Fault::Cancelled`][crate::Fault::Cancelled] without running the
//! [`on_retry`][RetryLayer::on_retry] callback. A [`Fault::Cancelled`][crate::Fault::Cancelled]
//! outcome is never retried, even when the predicate accepts it.
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Max retry attempts | `3` (4 executions) | [`max_retry_attempts`][RetryLayer::max_retry_attempts], [`infinite_retry_attempts`][RetryLayer::infinite_retry_attempts] |
//! | Backoff | [`Backoff::Exponential`] | [`backoff`][RetryLayer::backoff] |
//! | Base delay | 2 seconds | [`base_delay`][RetryLayer::base_delay] |
//! | Jitter | enabled | [`use_jitter`][RetryLayer::use_jitter] |
//! | Handled outcomes | every fault except cancellation | [`should_handle`][RetryLayer::should_handle] |
//!
//! # Telemetry
//!
//! | Event | Severity | When |
//! |-------|----------|------|
//! | `execution_attempt` | Warning if handled, else Information | after every attempt |
//! | `retry` | Warning | before waiting for the next attempt |

mod args;
mod backoff;
mod callbacks;
mod constants;
mod layer;
mod service;

pub use args::{DelayArgs, OnRetryArgs};
pub use backoff::Backoff;
pub(crate) use callbacks::{DelayGenerator, OnRetry};
pub use layer::RetryLayer;
pub use service::Retry;
pub(crate) use service::RetryShared;
