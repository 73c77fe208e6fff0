// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Upper bounds on execution time.
//!
//! [`Timeout`] runs the rest of the pipeline under a child cancellation token and fails the call
//! with [`Fault::TimedOut`][crate::Fault::TimedOut] once the configured time has elapsed.
//! [`TimeoutLayer`] configures it; the timeout itself is required.
//!
//! # Disciplines
//!
//! - **Cooperative** (default): at the deadline the child token is cancelled and the inner
//!   execution is abandoned by dropping it. Blocking operations cannot be dropped mid-call, so
//!   they should poll [`ResilienceContext::is_cancelled`][crate::ResilienceContext::is_cancelled];
//!   the timeout is reported when they return.
//! - **Abandon and race**: the inner execution runs away from the caller, on a
//!   [`Spawner`][anyspawn::Spawner] or a dedicated thread for blocking calls. At the deadline
//!   the caller returns immediately and the operation keeps running as an [`AbandonedTask`].
//!
//! A caller cancellation that happens before the deadline ends the call with
//! [`Fault::Cancelled`][crate::Fault::Cancelled] and no timeout is reported.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::timeout::Timeout;
//! use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
//! use tick::Clock;
//!
//! let options = PipelineOptions::new(Clock::new_frozen());
//! let pipeline = Pipeline::builder(&options)
//!     .add(
//!         Timeout::layer("timeout", &options)
//!             .timeout(Duration::from_millis(10))
//!             .timeout_provider(|context, _| context.operation_key().map(|_| Duration::from_millis(50))),
//!     )
//!     .build();
//!
//! let outcome = pipeline.execute_blocking(&ResilienceContext::new(), |context| {
//!     while !context.is_cancelled() {
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//!     Ok::<_, Fault>(())
//! });
//!
//! assert!(matches!(outcome, Err(Fault::TimedOut { .. })));
//! ```
//!
//! # Telemetry
//!
//! | Event | Severity |
//! |-------|----------|
//! | `timeout` | Error |

mod abandoned;
mod args;
mod callbacks;
mod layer;
mod service;

pub use abandoned::AbandonedTask;
pub use args::{OnTimeoutArgs, TimeoutProviderArgs};
pub(crate) use callbacks::{OnTimeout, TimeoutProvider};
pub use layer::TimeoutLayer;
pub(crate) use service::{Discipline, TimeoutShared};
pub use service::Timeout;
