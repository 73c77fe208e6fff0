// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaking for operations that keep failing.
//!
//! [`CircuitBreaker`] tracks the failure rate of the rest of the pipeline and rejects executions
//! while the circuit is open. [`CircuitBreakerLayer`] configures it and
//! [`CircuitBreakerControl`] observes and overrides it from outside the pipeline.
//!
//! # States
//!
//! - **Closed**: executions pass through and their outcomes are recorded in the sampling window.
//!   After each recorded outcome, the circuit opens when the window holds at least
//!   [`minimum_throughput`][CircuitBreakerLayer::minimum_throughput] executions and the failure
//!   rate is at or above [`failure_ratio`][CircuitBreakerLayer::failure_ratio].
//! - **Open**: executions are rejected with [`Fault::CircuitOpen`][crate::Fault::CircuitOpen]
//!   for [`break_duration`][CircuitBreakerLayer::break_duration].
//! - **Half-open**: the first execution after the break is a probe; others are rejected while it
//!   runs. A successful probe closes the circuit and clears the window, a failed probe opens it
//!   again. A probe that is cancelled or dropped frees the slot for the next execution.
//! - **Isolated**: entered and left only through [`CircuitBreakerControl`]; executions are
//!   rejected with [`Fault::CircuitIsolated`][crate::Fault::CircuitIsolated].
//!
//! Cancelled executions are never recorded.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::circuit_breaker::{CircuitBreaker, CircuitState};
//! use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
//! use tick::Clock;
//!
//! let options = PipelineOptions::new(Clock::new_frozen());
//! let pipeline = Pipeline::builder(&options)
//!     .add(
//!         CircuitBreaker::layer("breaker", &options)
//!             .failure_ratio(0.5)
//!             .minimum_throughput(2)
//!             .break_duration(Duration::from_secs(30)),
//!     )
//!     .build();
//!
//! let context = ResilienceContext::new();
//! for _ in 0..2 {
//!     let _ = pipeline.execute_blocking(&context, |_| Err::<(), _>(Fault::application("down")));
//! }
//!
//! let rejected = pipeline.execute_blocking(&context, |_| Ok(()));
//! assert!(matches!(rejected, Err(Fault::CircuitOpen { .. })));
//! ```
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Failure ratio | `0.1` | [`failure_ratio`][CircuitBreakerLayer::failure_ratio] |
//! | Minimum throughput | `100` | [`minimum_throughput`][CircuitBreakerLayer::minimum_throughput] |
//! | Sampling duration | 30 seconds | [`sampling_duration`][CircuitBreakerLayer::sampling_duration] |
//! | Break duration | 5 seconds | [`break_duration`][CircuitBreakerLayer::break_duration] |
//! | Failures | every fault except cancellation | [`should_handle`][CircuitBreakerLayer::should_handle] |
//!
//! # Telemetry
//!
//! | Event | Severity |
//! |-------|----------|
//! | `circuit_opened` | Error |
//! | `circuit_half_opened` | Warning |
//! | `circuit_closed` | Information |
//! | `circuit_rejected` | Error |

mod args;
mod breaker;
mod callbacks;
mod constants;
mod control;
mod engine;
mod health;
mod layer;
mod service;

pub use args::{OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs};
pub(crate) use callbacks::{OnClosed, OnHalfOpened, OnOpened};
pub use control::CircuitBreakerControl;
pub use engine::CircuitState;
pub use health::HealthInfo;
pub use layer::CircuitBreakerLayer;
pub use service::CircuitBreaker;
pub(crate) use service::CircuitBreakerShared;
