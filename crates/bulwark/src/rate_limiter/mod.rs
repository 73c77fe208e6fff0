// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Admission through an external rate limiter.
//!
//! [`RateLimiter`] bridges a pipeline to any lease-based limiter implementing [`LeaseLimiter`].
//! Each execution acquires a [`RateLimitLease`] first; a rejected lease fails the call with
//! [`Fault::RateLimiterRejected`][crate::Fault::RateLimiterRejected], whose retry-after hint is
//! picked up by an outer [`Retry`][crate::Retry] as its next delay.
//!
//! # Ownership
//!
//! A limiter passed to [`limiter`][RateLimiterLayer::limiter] belongs to the caller and can be
//! shared between pipelines. A limiter created by
//! [`limiter_factory`][RateLimiterLayer::limiter_factory] belongs to the pipeline and is disposed
//! when the last clone of the pipeline is dropped.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::rate_limiter::{RateLimiter, TokenBucketLimiter};
//! use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
//! use tick::Clock;
//!
//! let clock = Clock::new_frozen();
//! let options = PipelineOptions::new(&clock);
//! let pipeline = Pipeline::builder(&options)
//!     .add(
//!         RateLimiter::layer("limiter", &options)
//!             .limiter_factory(move || TokenBucketLimiter::new(&clock, 100, Duration::from_secs(1))),
//!     )
//!     .build();
//!
//! let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok::<_, Fault>(1));
//! assert_eq!(outcome.unwrap(), 1);
//! ```
//!
//! # Telemetry
//!
//! | Event | Severity |
//! |-------|----------|
//! | `rate_limiter_rejected` | Error |

mod args;
mod callbacks;
mod layer;
mod lease;
mod service;
mod token_bucket;

pub use args::OnRateLimiterRejectedArgs;
pub(crate) use callbacks::{LimiterFactory, OnRejected};
pub use layer::RateLimiterLayer;
pub use lease::{LeaseLimiter, RateLimitLease};
pub use service::RateLimiter;
pub(crate) use service::{Limiter, RateLimiterShared};
pub use token_bucket::TokenBucketLimiter;
