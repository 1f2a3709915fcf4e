// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Coalescing, rate-limited work queue.
//!
//! Keys added while already queued collapse into one entry. A key handed to a worker
//! is "processing" until [`WorkQueue::done`] is called; adds that arrive meanwhile mark
//! it dirty and it is queued again once, after `done`. A key is therefore never
//! processed by two workers at the same time.
//!
//! Failed keys are re-added with [`WorkQueue::add_rate_limited`] after a per-key
//! exponential delay that [`WorkQueue::forget`] resets.
//!
//! After [`WorkQueue::shut_down`] nothing more is handed out, even keys still queued.

use crate::reconcilers::retry::ItemBackoff;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

/// Deduplicating work queue with per-key backoff.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    backoff: Mutex<ItemBackoff>,
    notify: Notify,
}

impl WorkQueue {
    /// Create a queue whose requeue delays are capped at `max_delay`.
    #[must_use]
    pub fn new(max_delay: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            backoff: Mutex::new(ItemBackoff::new(max_delay)),
            notify: Notify::new(),
        }
    }

    // A poisoned lock only means a panic elsewhere; the sets are still consistent.
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn backoff(&self) -> MutexGuard<'_, ItemBackoff> {
        self.backoff
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue `key` unless it is already queued. Ignored after shutdown.
    pub fn add(&self, key: &str) {
        let mut state = self.state();
        if state.shutting_down || state.dirty.contains(key) {
            return;
        }

        state.dirty.insert(key.to_string());
        if state.processing.contains(key) {
            return;
        }

        state.queue.push_back(key.to_string());
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<String> {
        loop {
            // Register interest before checking so a concurrent add cannot be missed
            let notified = self.notify.notified();
            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark `key` as finished. Requeues it if it was added while being processed.
    pub fn done(&self, key: &str) {
        let mut state = self.state();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Guard that calls [`WorkQueue::done`] for `key` when dropped.
    ///
    /// Releases the key even if processing panics.
    #[must_use]
    pub fn done_on_drop(&self, key: &str) -> DoneGuard<'_> {
        DoneGuard {
            queue: self,
            key: key.to_string(),
        }
    }

    /// Re-add `key` after its backoff delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: &str) {
        let delay = self.backoff().when(key);
        debug!(key = key, delay = ?delay, "Requeueing with backoff");

        let queue = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(&key);
        });
    }

    /// Reset the backoff of `key`.
    pub fn forget(&self, key: &str) {
        self.backoff().forget(key);
    }

    /// Consecutive rate-limited requeues of `key` since the last `forget`.
    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.backoff().num_requeues(key)
    }

    /// Number of keys waiting to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting and handing out keys, and wake all waiting workers.
    ///
    /// Keys already being processed finish normally.
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }
}

/// Marks a key done when dropped. See [`WorkQueue::done_on_drop`].
pub struct DoneGuard<'a> {
    queue: &'a WorkQueue,
    key: String,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
