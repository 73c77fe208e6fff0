// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures_util::future::BoxFuture;

use super::{FallbackArgs, OnFallbackArgs};
use crate::Outcome;
use crate::options::define_fn_wrapper;

define_fn_wrapper!(SyncProvider<T>(Fn(Outcome<T>, FallbackArgs) -> Outcome<T>));
define_fn_wrapper!(AsyncProvider<T>(Fn(Outcome<T>, FallbackArgs) -> BoxFuture<'static, Outcome<T>>));
define_fn_wrapper!(OnFallback<T>(Fn(&Outcome<T>, OnFallbackArgs)));

/// Computes the replacement outcome.
#[derive(Debug)]
pub(crate) enum Provider<T> {
    Sync(SyncProvider<T>),
    Async(AsyncProvider<T>),
}

impl<T> Provider<T> {
    pub(crate) async fn provide(&self, outcome: Outcome<T>, args: FallbackArgs) -> Outcome<T> {
        match self {
            Self::Sync(provider) => provider.call(outcome, args),
            Self::Async(provider) => provider.call(outcome, args).await,
        }
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(provider) => Self::Sync(provider.clone()),
            Self::Async(provider) => Self::Async(provider.clone()),
        }
    }
}
