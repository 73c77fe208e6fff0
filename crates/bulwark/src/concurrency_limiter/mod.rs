// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded concurrency (bulkhead isolation).
//!
//! [`ConcurrencyLimiter`] caps how many executions run through the rest of the pipeline at once
//! and how many may wait for their turn. Excess executions fail fast with
//! [`Fault::BulkheadRejected`][crate::Fault::BulkheadRejected], which keeps a slow dependency
//! from tying up every caller.
//!
//! Waiting follows the execution mode: asynchronous executions suspend, blocking executions park
//! their thread. A waiting execution leaves the queue with
//! [`Fault::Cancelled`][crate::Fault::Cancelled] when its call is cancelled.
//!
//! # Examples
//!
//! ```
//! use bulwark::concurrency_limiter::ConcurrencyLimiter;
//! use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
//! use tick::Clock;
//!
//! let options = PipelineOptions::new(Clock::new_frozen());
//! let pipeline = Pipeline::builder(&options)
//!     .add(ConcurrencyLimiter::layer("bulkhead", &options).permit_limit(8).queue_limit(16))
//!     .build();
//!
//! let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok::<_, Fault>("done"));
//! assert_eq!(outcome.unwrap(), "done");
//! ```
//!
//! # Defaults
//!
//! | Parameter | Default Value | Configured By |
//! |-----------|---------------|---------------|
//! | Permits | `1000` | [`permit_limit`][ConcurrencyLimiterLayer::permit_limit] |
//! | Queue | `0` | [`queue_limit`][ConcurrencyLimiterLayer::queue_limit] |
//!
//! # Telemetry
//!
//! | Event | Severity |
//! |-------|----------|
//! | `concurrency_limiter_rejected` | Error |

mod args;
mod callbacks;
mod constants;
mod layer;
mod service;

pub use args::OnConcurrencyRejectedArgs;
pub(crate) use callbacks::OnRejected;
pub use layer::ConcurrencyLimiterLayer;
pub use service::ConcurrencyLimiter;
pub(crate) use service::ConcurrencyLimiterShared;
