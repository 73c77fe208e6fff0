// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{OnCircuitClosedArgs, OnCircuitHalfOpenedArgs, OnCircuitOpenedArgs};
use crate::options::define_fn_wrapper;

define_fn_wrapper!(OnOpened(Fn(OnCircuitOpenedArgs)));
define_fn_wrapper!(OnClosed(Fn(OnCircuitClosedArgs)));
define_fn_wrapper!(OnHalfOpened(Fn(OnCircuitHalfOpenedArgs)));
