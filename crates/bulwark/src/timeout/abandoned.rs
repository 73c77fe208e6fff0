// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

use anyspawn::Spawner;
use futures_channel::oneshot;
use futures_util::FutureExt;
use layered::Service;

use crate::{Execution, ExecutionMode, Fault, Operation, Outcome, wait};

type Report<T> = thread::Result<Outcome<T>>;

#[cfg(test)]
thread_local! {
    /// Makes thread creation fail on the current thread.
    pub(crate) static REFUSE_THREADS: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// An operation left running after an abandon-and-race timeout.
///
/// Awaiting the task yields the outcome the operation eventually produced. Use
/// [`wait`][Self::wait] from blocking code. Dropping the task detaches the operation; it keeps
/// running to completion and its outcome is discarded.
///
/// A panic raised by the operation is resumed when the task is awaited. If the operation is
/// torn down without producing an outcome, for example because its runtime shut down, the task
/// yields [`Fault::Cancelled`].
pub struct AbandonedTask<T> {
    receiver: oneshot::Receiver<Report<T>>,
}

impl<T: Send + 'static> AbandonedTask<T> {
    /// Starts `execution` away from the caller.
    ///
    /// Asynchronous executions are spawned with `spawner`; blocking executions get a dedicated
    /// thread, since they cannot share a runtime worker with the caller. Fails only when that
    /// thread cannot be created.
    pub(crate) fn start<O, S>(spawner: &Spawner, inner: Arc<S>, execution: Execution<T, O>) -> io::Result<Self>
    where
        O: Operation<T>,
        S: Service<Execution<T, O>, Out = Outcome<T>> + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        match execution.context().execution_mode() {
            ExecutionMode::Asynchronous => {
                // Dropping the handle detaches the task.
                drop(spawner.spawn(async move {
                    let report = AssertUnwindSafe(inner.execute(execution)).catch_unwind().await;
                    let _ = sender.send(report);
                }));
            }
            ExecutionMode::Synchronous => {
                #[cfg(test)]
                if REFUSE_THREADS.get() {
                    return Err(io::Error::other("thread creation refused"));
                }

                thread::Builder::new()
                    .name("bulwark-abandoned".to_string())
                    .spawn(move || {
                        let report = panic::catch_unwind(AssertUnwindSafe(|| wait::block_on(inner.execute(execution))));
                        let _ = sender.send(report);
                    })?;
            }
        }

        Ok(Self { receiver })
    }
}

impl<T> AbandonedTask<T> {
    /// Blocks the current thread until the operation finishes.
    pub fn wait(self) -> Outcome<T> {
        wait::block_on(self)
    }

    /// Returns `true` while the operation has not produced an outcome.
    ///
    /// An outcome observed here is consumed.
    pub(crate) fn is_running(&mut self) -> bool {
        matches!(self.receiver.try_recv(), Ok(None))
    }
}

impl<T> Future for AbandonedTask<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(outcome))) => Poll::Ready(outcome),
            Poll::Ready(Ok(Err(payload))) => panic::resume_unwind(payload),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Fault::Cancelled)),
        }
    }
}

impl<T> Debug for AbandonedTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbandonedTask").finish_non_exhaustive()
    }
}
