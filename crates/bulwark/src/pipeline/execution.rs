// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::future::ready;
use std::marker::PhantomData;
use std::sync::Arc;

use layered::Service;

use crate::{Fault, Outcome, ResilienceContext};

/// A user operation that strategies may invoke once per attempt.
///
/// [`Pipeline`][crate::Pipeline] wraps the closures it is given in [`AsyncOperation`] or
/// [`BlockingOperation`]; custom strategies only need this trait as a bound.
pub trait Operation<T>: Send + Sync + 'static {
    /// Starts one invocation under `context`.
    fn invoke(&self, context: ResilienceContext) -> impl Future<Output = Outcome<T>> + Send;
}

/// An asynchronous operation passed to [`Pipeline::execute`][crate::Pipeline::execute].
pub struct AsyncOperation<F>(F);

impl<T, F, Fut> Operation<T> for AsyncOperation<F>
where
    F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
{
    fn invoke(&self, context: ResilienceContext) -> impl Future<Output = Outcome<T>> + Send {
        (self.0)(context)
    }
}

/// A blocking operation passed to [`Pipeline::execute_blocking`][crate::Pipeline::execute_blocking].
pub struct BlockingOperation<F>(F);

impl<T, F> Operation<T> for BlockingOperation<F>
where
    T: Send,
    F: Fn(ResilienceContext) -> Outcome<T> + Send + Sync + 'static,
{
    fn invoke(&self, context: ResilienceContext) -> impl Future<Output = Outcome<T>> + Send {
        // Invoked right before being awaited, so the closure still runs on the driving thread.
        ready((self.0)(context))
    }
}

impl<F> Debug for AsyncOperation<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AsyncOperation")
    }
}

impl<F> Debug for BlockingOperation<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlockingOperation")
    }
}

/// The input flowing through the strategies of a pipeline.
///
/// An execution pairs the per-call [`ResilienceContext`] with the user operation. Strategies may
/// clone it to run the operation again (retries) or replace its context to scope cancellation
/// (timeouts); clones share the operation. It is created by [`Pipeline`][crate::Pipeline] and
/// only needs to be named when writing custom strategies.
pub struct Execution<T, O> {
    context: ResilienceContext,
    operation: Arc<O>,
    _out: PhantomData<fn() -> T>,
}

impl<T, F> Execution<T, AsyncOperation<F>> {
    pub(crate) fn new_async<Fut>(context: ResilienceContext, operation: F) -> Self
    where
        F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self::new(context, AsyncOperation(operation))
    }
}

impl<T, F> Execution<T, BlockingOperation<F>> {
    pub(crate) fn new_blocking(context: ResilienceContext, operation: F) -> Self
    where
        F: Fn(ResilienceContext) -> Outcome<T> + Send + Sync + 'static,
    {
        Self::new(context, BlockingOperation(operation))
    }
}

impl<T, O> Execution<T, O> {
    fn new(context: ResilienceContext, operation: O) -> Self {
        Self {
            context,
            operation: Arc::new(operation),
            _out: PhantomData,
        }
    }

    /// The context of this execution.
    #[must_use]
    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// Returns the same operation bound to another context.
    #[must_use]
    pub fn with_context(&self, context: ResilienceContext) -> Self {
        Self {
            context,
            operation: Arc::clone(&self.operation),
            _out: PhantomData,
        }
    }
}

impl<T, O> Clone for Execution<T, O> {
    fn clone(&self) -> Self {
        self.with_context(self.context.clone())
    }
}

impl<T, O: Debug> Debug for Execution<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("context", &self.context)
            .field("operation", &self.operation)
            .finish()
    }
}

/// The innermost service of every pipeline: invokes the user operation.
///
/// A cancelled context short-circuits to [`Fault::Cancelled`] without calling the operation.
pub struct Invoke<T>(PhantomData<fn() -> T>);

impl<T> Invoke<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Debug for Invoke<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Invoke")
    }
}

impl<T, O> Service<Execution<T, O>> for Invoke<T>
where
    T: Send + 'static,
    O: Operation<T>,
{
    type Out = Outcome<T>;

    async fn execute(&self, execution: Execution<T, O>) -> Outcome<T> {
        let Execution { context, operation, .. } = execution;

        if context.is_cancelled() {
            return Err(Fault::Cancelled);
        }

        operation.invoke(context).await
    }
}
