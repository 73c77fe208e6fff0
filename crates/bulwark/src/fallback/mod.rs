// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Alternative outcomes for failed executions.
//!
//! [`Fallback`] inspects the outcome of the rest of the pipeline and, when its predicate handles
//! it, replaces it with the result of a provider. Add it first so it sees the faults raised by
//! every other strategy.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::fallback::Fallback;
//! use bulwark::timeout::Timeout;
//! use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
//! use tick::Clock;
//!
//! let options = PipelineOptions::new(Clock::new_frozen());
//! let pipeline = Pipeline::builder(&options)
//!     .add(
//!         Fallback::layer("fallback", &options)
//!             .should_handle(|outcome| matches!(outcome, Err(Fault::TimedOut { .. })))
//!             .fallback(|_, _| Ok("stale".to_string())),
//!     )
//!     .add(Timeout::layer("timeout", &options).timeout(Duration::from_millis(5)))
//!     .build();
//!
//! let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |context| {
//!     while !context.is_cancelled() {
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//!     Ok("fresh".to_string())
//! });
//! assert_eq!(outcome.unwrap(), "stale");
//! ```
//!
//! # Telemetry
//!
//! | Event | Severity |
//! |-------|----------|
//! | `fallback` | Warning |

mod args;
mod callbacks;
mod layer;
mod service;

pub use args::{FallbackArgs, OnFallbackArgs};
pub(crate) use callbacks::{AsyncProvider, OnFallback, Provider, SyncProvider};
pub use layer::FallbackLayer;
pub use service::Fallback;
pub(crate) use service::FallbackShared;
