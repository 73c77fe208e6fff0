// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-call execution context.

mod pool;
mod properties;

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub use pool::{ContextPool, PooledContext};
pub use properties::PropertyKey;
pub(crate) use properties::Properties;

/// Whether an execution was started through the asynchronous or the blocking entry point.
///
/// Strategies consult the mode when they need to wait: asynchronous executions suspend on the
/// pipeline clock, blocking executions park the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ExecutionMode {
    /// Started with [`Pipeline::execute`][crate::Pipeline::execute].
    #[default]
    Asynchronous,

    /// Started with [`Pipeline::execute_blocking`][crate::Pipeline::execute_blocking].
    Synchronous,
}

/// Carries per-call state through every strategy of a pipeline.
///
/// The context holds an optional operation key, the cancellation signal observed by strategies
/// and by the operation, the [`ExecutionMode`] and a typed property bag shared by all clones of
/// the context. Cloning is cheap; clones observe the same properties.
///
/// Strategies that need to cancel only the work beneath them (timeouts) derive a child context
/// with a linked [`CancellationToken`]; cancelling the parent token cancels every child.
///
/// # Examples
///
/// ```
/// use bulwark::{PropertyKey, ResilienceContext};
///
/// const TENANT: PropertyKey<String> = PropertyKey::new("tenant");
///
/// let context = ResilienceContext::new().with_operation_key("orders.get");
/// context.set_property(&TENANT, "contoso".to_string());
///
/// assert_eq!(context.operation_key(), Some("orders.get"));
/// assert_eq!(context.property(&TENANT).as_deref(), Some("contoso"));
/// assert!(!context.is_cancelled());
/// ```
#[derive(Clone)]
pub struct ResilienceContext {
    operation_key: Option<Arc<str>>,
    cancellation: CancellationToken,
    mode: ExecutionMode,
    properties: Arc<Mutex<Properties>>,
}

impl ResilienceContext {
    /// Creates a context with no operation key and a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Arc::default(), CancellationToken::new())
    }

    pub(crate) fn from_parts(properties: Arc<Mutex<Properties>>, cancellation: CancellationToken) -> Self {
        Self {
            operation_key: None,
            cancellation,
            mode: ExecutionMode::Asynchronous,
            properties,
        }
    }

    /// Sets the key identifying the operation in telemetry.
    #[must_use]
    pub fn with_operation_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.operation_key = Some(key.into());
        self
    }

    /// Replaces the cancellation token observed by this context.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The operation key, if one was set.
    #[must_use]
    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    pub(crate) fn operation_key_shared(&self) -> Option<Arc<str>> {
        self.operation_key.clone()
    }

    /// The cancellation token observed by strategies and by the operation.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The mode of the execution currently using this context.
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns `true` when the execution blocks the calling thread.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.mode == ExecutionMode::Synchronous
    }

    /// Stores `value` under `key`, replacing any previous value with the same name.
    pub fn set_property<V>(&self, key: &PropertyKey<V>, value: V)
    where
        V: Send + Sync + 'static,
    {
        self.properties.lock().set(key, value);
    }

    /// Returns a copy of the value stored under `key`.
    ///
    /// Returns `None` when nothing is stored or when the stored value has a different type.
    #[must_use]
    pub fn property<V>(&self, key: &PropertyKey<V>) -> Option<V>
    where
        V: Clone + 'static,
    {
        self.properties.lock().get(key).cloned()
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove_property<V>(&self, key: &PropertyKey<V>) -> Option<V>
    where
        V: 'static,
    {
        self.properties.lock().remove(key)
    }

    /// Returns `true` when a value with the name of `key` is stored.
    #[must_use]
    pub fn contains_property<V>(&self, key: &PropertyKey<V>) -> bool {
        self.properties.lock().contains(key.name())
    }

    pub(crate) fn with_mode(&self, mode: ExecutionMode) -> Self {
        Self { mode, ..self.clone() }
    }

    /// Derives a context whose token is cancelled with this one or on its own.
    pub(crate) fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            ..self.clone()
        }
    }
}

impl Default for ResilienceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ResilienceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceContext")
            .field("operation_key", &self.operation_key)
            .field("cancelled", &self.is_cancelled())
            .field("mode", &self.mode)
            .field("properties", &self.properties.lock().len())
            .finish()
    }
}
