// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{DelayArgs, OnRetryArgs};
use crate::Outcome;
use crate::options::define_fn_wrapper;

define_fn_wrapper!(DelayGenerator<T>(Fn(&Outcome<T>, DelayArgs) -> Option<Duration>));
define_fn_wrapper!(OnRetry<T>(Fn(&Outcome<T>, OnRetryArgs)));
