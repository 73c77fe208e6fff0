// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{LeaseLimiter, OnRateLimiterRejectedArgs};
use crate::options::define_fn_wrapper;

define_fn_wrapper!(OnRejected(Fn(OnRateLimiterRejectedArgs)));
define_fn_wrapper!(LimiterFactory(Fn() -> Box<dyn LeaseLimiter>));
