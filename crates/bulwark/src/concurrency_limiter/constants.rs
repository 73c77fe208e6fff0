// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub(super) const DEFAULT_PERMIT_LIMIT: u32 = 1000;
pub(super) const DEFAULT_QUEUE_LIMIT: u32 = 0;
