// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{OnTimeoutArgs, TimeoutProviderArgs};
use crate::ResilienceContext;
use crate::options::define_fn_wrapper;

define_fn_wrapper!(TimeoutProvider(Fn(&ResilienceContext, TimeoutProviderArgs) -> Option<Duration>));
define_fn_wrapper!(OnTimeout<T>(Fn(OnTimeoutArgs<T>)));
