// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Composition and execution of strategy chains.

mod execution;

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use layered::Service;
use tower_layer::{Identity, Layer, Stack};

pub use execution::{AsyncOperation, BlockingOperation, Execution, Invoke, Operation};

use crate::{ContextPool, ExecutionMode, Outcome, PipelineOptions, ResilienceContext, wait};

/// An immutable, ordered chain of strategies wrapped around user operations.
///
/// A pipeline is built once with [`Pipeline::builder`] and then shared: cloning is cheap and every
/// clone runs the same strategies with the same state (circuit health, permits, leases). The
/// first strategy added is the outermost one, so a fallback added before a timeout observes the
/// timeout's fault.
///
/// `S` is the linked chain. It is spelled out by the compiler, so pipelines are usually held in
/// inferred bindings; code that stores one in a field names the strategy types, such as
/// `Pipeline<u32, Retry<u32, Invoke<u32>>>`.
///
/// The same chain serves both entry points. [`Pipeline::execute`] runs asynchronously and waits
/// on the pipeline clock; [`Pipeline::execute_blocking`] drives the chain on the calling thread
/// and blocks it while strategies wait. Either way the chain is called directly: beyond the
/// shared handle to the operation, the strategies themselves do not allocate on the success
/// path.
///
/// Dropping the last clone releases every resource the pipeline owns, such as rate limiters it
/// created itself.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext, Retry, Timeout};
/// use tick::Clock;
///
/// let options = PipelineOptions::new(Clock::new_frozen()).name("greeting");
///
/// let pipeline = Pipeline::builder(&options)
///     .add(Retry::layer("retry", &options).max_retry_attempts(2).base_delay(Duration::ZERO))
///     .add(Timeout::layer("timeout", &options).timeout(Duration::from_secs(5)))
///     .build();
///
/// let greeting = pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok::<_, Fault>("hello"));
/// assert_eq!(greeting.unwrap(), "hello");
/// ```
pub struct Pipeline<T, S> {
    name: Cow<'static, str>,
    chain: Arc<S>,
    _out: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Pipeline<T, ()> {
    /// Starts composing a pipeline.
    #[must_use]
    pub fn builder(options: &PipelineOptions<T>) -> PipelineBuilder<T, Identity> {
        PipelineBuilder {
            name: options.pipeline_name().clone(),
            layer: Identity::new(),
            _out: PhantomData,
        }
    }
}

impl<T: Send + 'static, S> Pipeline<T, S> {
    /// The pipeline name from its options.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `operation` through the strategies.
    ///
    /// The operation receives the context of the current attempt; it should observe its
    /// cancellation token. The call returns [`Fault::Cancelled`][crate::Fault::Cancelled]
    /// without invoking the operation when `context` is already cancelled.
    pub async fn execute<F, Fut>(&self, context: &ResilienceContext, operation: F) -> Outcome<T>
    where
        F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
        S: Service<Execution<T, AsyncOperation<F>>, Out = Outcome<T>>,
    {
        let execution = Execution::new_async(context.with_mode(ExecutionMode::Asynchronous), operation);
        self.chain.execute(execution).await
    }

    /// Runs a blocking `operation` through the strategies on the calling thread.
    ///
    /// Strategy waits (retry delays, queued permits) block the thread. Timeouts still apply: a
    /// cooperative timeout cancels the context token once the deadline passes and reports
    /// [`Fault::TimedOut`][crate::Fault::TimedOut] when the operation returns.
    pub fn execute_blocking<F>(&self, context: &ResilienceContext, operation: F) -> Outcome<T>
    where
        F: Fn(ResilienceContext) -> Outcome<T> + Send + Sync + 'static,
        S: Service<Execution<T, BlockingOperation<F>>, Out = Outcome<T>>,
    {
        let execution = Execution::new_blocking(context.with_mode(ExecutionMode::Synchronous), operation);
        wait::block_on(self.chain.execute(execution))
    }

    /// Like [`Pipeline::execute`], with a context rented from the shared [`ContextPool`].
    pub async fn run<F, Fut>(&self, operation: F) -> Outcome<T>
    where
        F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
        S: Service<Execution<T, AsyncOperation<F>>, Out = Outcome<T>>,
    {
        let context = ContextPool::shared().rent();
        self.execute(&context, operation).await
    }

    /// Like [`Pipeline::execute_blocking`], with a context rented from the shared [`ContextPool`].
    pub fn run_blocking<F>(&self, operation: F) -> Outcome<T>
    where
        F: Fn(ResilienceContext) -> Outcome<T> + Send + Sync + 'static,
        S: Service<Execution<T, BlockingOperation<F>>, Out = Outcome<T>>,
    {
        let context = ContextPool::shared().rent();
        self.execute_blocking(&context, operation)
    }
}

impl<T, S> Clone for Pipeline<T, S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            chain: Arc::clone(&self.chain),
            _out: PhantomData,
        }
    }
}

impl<T, S> Debug for Pipeline<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Collects strategy layers and links them into a [`Pipeline`].
///
/// Layers are applied in the order they are added: the first is the outermost. A layer whose
/// required properties are not configured does not implement [`Layer`], so `build` does not
/// compile until it is.
pub struct PipelineBuilder<T, L> {
    name: Cow<'static, str>,
    layer: L,
    _out: PhantomData<fn() -> T>,
}

impl<T: Send + 'static, L> PipelineBuilder<T, L> {
    /// Adds a strategy inside the ones added so far.
    #[must_use]
    pub fn add<N>(self, layer: N) -> PipelineBuilder<T, Stack<N, L>> {
        PipelineBuilder {
            name: self.name,
            layer: Stack::new(layer, self.layer),
            _out: PhantomData,
        }
    }

    /// Links the strategies around the operation invoker.
    #[must_use]
    pub fn build(self) -> Pipeline<T, L::Service>
    where
        L: Layer<Invoke<T>>,
    {
        Pipeline {
            name: self.name,
            chain: Arc::new(self.layer.layer(Invoke::new())),
            _out: PhantomData,
        }
    }
}

impl<T, L: Debug> Debug for PipelineBuilder<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("layer", &self.layer)
            .finish()
    }
}
