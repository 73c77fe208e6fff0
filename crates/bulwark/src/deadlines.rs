// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide deadline thread used by blocking executions.
//!
//! A blocking operation cannot be interrupted by polling a timer, so a cooperative timeout
//! registers its child cancellation token here and a single background thread cancels it once
//! the deadline passes. Dropping the returned [`DeadlineGuard`] withdraws the registration.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::LazyLock;
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;

static QUEUE: LazyLock<DeadlineQueue> = LazyLock::new(DeadlineQueue::default);

/// Cancels `token` at `deadline` unless the guard is dropped first.
pub(crate) fn cancel_at(deadline: Instant, token: CancellationToken) -> DeadlineGuard {
    QUEUE.schedule(deadline, token)
}

#[derive(Debug)]
#[must_use]
pub(crate) struct DeadlineGuard {
    id: u64,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        QUEUE.state.lock().tokens.remove(&self.id);
    }
}

#[derive(Default)]
struct DeadlineQueue {
    state: Mutex<QueueState>,
    wakeup: Condvar,
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    tokens: HashMap<u64, CancellationToken>,
    next_id: u64,
    worker_started: bool,
}

impl DeadlineQueue {
    fn schedule(&'static self, deadline: Instant, token: CancellationToken) -> DeadlineGuard {
        let mut state = self.state.lock();

        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        state.heap.push(Reverse((deadline, id)));
        state.tokens.insert(id, token);

        if !state.worker_started {
            state.worker_started = self.start_worker();
        }

        drop(state);
        self.wakeup.notify_one();

        DeadlineGuard { id }
    }

    fn start_worker(&'static self) -> bool {
        let spawned = thread::Builder::new()
            .name("bulwark-deadlines".to_string())
            .spawn(move || self.run());

        match spawned {
            Ok(_) => true,
            Err(error) => {
                // Timed out blocking calls are still detected once the operation returns.
                tracing::error!(error = %error, "unable to start the deadline thread");
                false
            }
        }
    }

    fn run(&self) {
        let mut expired = Vec::new();
        let mut state = self.state.lock();

        loop {
            let now = Instant::now();

            while matches!(state.heap.peek(), Some(Reverse((deadline, _))) if *deadline <= now) {
                if let Some(Reverse((_, id))) = state.heap.pop()
                    && let Some(token) = state.tokens.remove(&id)
                {
                    expired.push(token);
                }
            }

            if !expired.is_empty() {
                drop(state);
                expired.drain(..).for_each(|token| token.cancel());
                state = self.state.lock();
                continue;
            }

            match state.heap.peek() {
                Some(Reverse((deadline, _))) => {
                    let deadline = *deadline;
                    self.wakeup.wait_until(&mut state, deadline);
                }
                None => self.wakeup.wait(&mut state),
            }
        }
    }
}
