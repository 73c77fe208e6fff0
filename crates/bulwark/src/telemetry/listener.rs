// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::ResilienceEvent;

/// Receives every [`ResilienceEvent`] reported by the strategies of a pipeline.
///
/// Listeners run inline on the thread executing the strategy, so they should be quick. A panic
/// raised by a listener is caught and logged; it never reaches the execution.
///
/// Any `Fn(&ResilienceEvent)` closure is a listener.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use bulwark::{PipelineOptions, ResilienceEvent};
/// use tick::Clock;
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
///
/// let options = PipelineOptions::<()>::new(Clock::new_frozen())
///     .listener(move |_event: &ResilienceEvent| {
///         counter.fetch_add(1, Ordering::Relaxed);
///     });
/// # let _ = options;
/// ```
pub trait TelemetryListener: Send + Sync + 'static {
    /// Handles a single event.
    fn write(&self, event: &ResilienceEvent);
}

impl<F> TelemetryListener for F
where
    F: Fn(&ResilienceEvent) + Send + Sync + 'static,
{
    fn write(&self, event: &ResilienceEvent) {
        self(event);
    }
}

#[derive(Clone)]
pub(crate) struct Listener(Arc<dyn TelemetryListener>);

impl Listener {
    pub(crate) fn new(listener: impl TelemetryListener) -> Self {
        Self(Arc::new(listener))
    }

    /// Delivers the event; returns `false` when the listener panicked.
    pub(crate) fn deliver(&self, event: &ResilienceEvent) -> bool {
        catch_unwind(AssertUnwindSafe(|| self.0.write(event))).is_ok()
    }
}

impl Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}
