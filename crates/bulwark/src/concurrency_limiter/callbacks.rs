// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::OnConcurrencyRejectedArgs;
use crate::options::define_fn_wrapper;

define_fn_wrapper!(OnRejected(Fn(OnConcurrencyRejectedArgs)));
