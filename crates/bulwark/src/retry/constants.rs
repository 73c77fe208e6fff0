// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::Backoff;

/// Exponential growth spaces out attempts against a struggling dependency.
pub(super) const DEFAULT_BACKOFF: Backoff = Backoff::Exponential;

pub(super) const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Jitter desynchronizes callers that failed at the same moment.
pub(super) const DEFAULT_USE_JITTER: bool = true;

/// Three retries, four executions in total.
pub(super) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
