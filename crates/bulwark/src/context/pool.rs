// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::ops::Deref;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{Properties, ResilienceContext};

const DEFAULT_CAPACITY: usize = 256;

static SHARED: LazyLock<ContextPool> = LazyLock::new(ContextPool::default);

/// Recycles the property storage of [`ResilienceContext`] instances.
///
/// [`ContextPool::rent`] hands out a [`PooledContext`] guard. When the guard is dropped the
/// context is reset and its storage returns to the pool, unless another clone of the context is
/// still alive (for example one captured by an operation abandoned by a timeout). Such storage
/// is left to the remaining owners and a fresh one is allocated later.
///
/// # Examples
///
/// ```
/// use bulwark::{ContextPool, PropertyKey};
///
/// const USER: PropertyKey<u64> = PropertyKey::new("user");
///
/// let pool = ContextPool::new(8);
/// {
///     let context = pool.rent().with_operation_key("profile.load");
///     context.set_property(&USER, 42);
/// }
///
/// // The storage came back empty.
/// let context = pool.rent();
/// assert_eq!(context.property(&USER), None);
/// assert_eq!(context.operation_key(), None);
/// ```
pub struct ContextPool {
    free: Mutex<Vec<Arc<Mutex<Properties>>>>,
    capacity: usize,
}

impl ContextPool {
    /// Creates a pool keeping at most `capacity` idle contexts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// The process-wide pool used by [`Pipeline::run`][crate::Pipeline::run].
    #[must_use]
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// Rents a context with no operation key and a fresh cancellation token.
    #[must_use]
    pub fn rent(&self) -> PooledContext<'_> {
        let properties = self.free.lock().pop().unwrap_or_default();

        PooledContext {
            pool: self,
            context: ResilienceContext::from_parts(properties, CancellationToken::new()),
        }
    }

    /// Number of idle contexts held by the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn give_back(&self, properties: Arc<Mutex<Properties>>) {
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(properties);
        }
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool")
            .field("idle", &self.idle())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// A rented [`ResilienceContext`] that returns to its [`ContextPool`] when dropped.
#[derive(Debug)]
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    context: ResilienceContext,
}

impl PooledContext<'_> {
    /// Sets the key identifying the operation in telemetry.
    #[must_use]
    pub fn with_operation_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.context.operation_key = Some(key.into());
        self
    }

    /// Replaces the cancellation token observed by this context.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.context.cancellation = token;
        self
    }
}

impl Deref for PooledContext<'_> {
    type Target = ResilienceContext;

    fn deref(&self) -> &ResilienceContext {
        &self.context
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        let properties = &self.context.properties;

        // Only reuse storage nobody else can observe anymore.
        if Arc::strong_count(properties) == 1 {
            properties.lock().clear();
            self.pool.give_back(Arc::clone(properties));
        }
    }
}
