// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backoff policies for requeueing failed reconciles and retrying status writes.
//!
//! Two policies live here:
//!
//! - [`ItemBackoff`] tracks consecutive failures per work-queue key and hands out
//!   exponentially growing requeue delays, reset by [`ItemBackoff::forget`] on success.
//! - [`retry_on_conflict`] retries a read-modify-write against the API server when the
//!   write is rejected with HTTP 409 because the object changed underneath it.

use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::constants::{
    QUEUE_BACKOFF_MULTIPLIER, QUEUE_BASE_DELAY_MILLIS, QUEUE_RANDOMIZATION_FACTOR,
};
use crate::errors::is_conflict;

/// Initial interval between conflict retries (10ms)
const CONFLICT_INITIAL_INTERVAL_MILLIS: u64 = 10;

/// Conflict retries do not grow: the object is re-read on every attempt
const CONFLICT_MULTIPLIER: f64 = 1.0;

/// Maximum number of conflict retries
const CONFLICT_MAX_RETRIES: u32 = 5;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration, restored by [`ExponentialBackoff::reset`]
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum number of intervals handed out before giving up
    pub max_retries: Option<u32>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    retries: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_retries: Option<u32>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_retries,
            multiplier,
            randomization_factor,
            retries: 0,
        }
    }

    /// Get the next backoff interval, or None if the retry budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_retries) = self.max_retries {
            if self.retries >= max_retries {
                return None;
            }
        }
        self.retries += 1;

        let interval = self.current_interval;
        // Jitter never pushes a delay past the ceiling
        let jittered = self.apply_jitter(interval).min(self.max_interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Restart the schedule from the initial interval.
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.retries = 0;
    }

    /// Number of intervals handed out since creation or the last reset.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff used for work-queue requeues.
///
/// # Configuration
///
/// - **Initial interval**: 5ms
/// - **Max interval**: `max_interval` (1000s by default)
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10%
/// - **Retries**: unbounded, the queue never gives up on a key
///
/// # Retry Schedule
///
/// 1. 5ms
/// 2. 10ms
/// 3. 20ms
/// 4. 40ms
/// 5. 80ms
///    ...
/// 19. ~22 minutes, capped at `max_interval`
#[must_use]
pub fn queue_backoff(max_interval: Duration) -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(QUEUE_BASE_DELAY_MILLIS),
        max_interval,
        None,
        QUEUE_BACKOFF_MULTIPLIER,
        QUEUE_RANDOMIZATION_FACTOR,
    )
}

/// Backoff used when a status write conflicts.
///
/// Five attempts 10ms apart (±10%). Each attempt re-reads the object first.
#[must_use]
pub fn conflict_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(CONFLICT_INITIAL_INTERVAL_MILLIS),
        Duration::from_millis(CONFLICT_INITIAL_INTERVAL_MILLIS),
        Some(CONFLICT_MAX_RETRIES),
        CONFLICT_MULTIPLIER,
        QUEUE_RANDOMIZATION_FACTOR,
    )
}

/// Per-key failure tracking for the work queue.
///
/// Each key gets its own [`ExponentialBackoff`]; consecutive failures of one key do not
/// slow down any other key.
#[derive(Debug)]
pub struct ItemBackoff {
    max_interval: Duration,
    items: HashMap<String, ExponentialBackoff>,
}

impl ItemBackoff {
    /// Create a tracker whose delays are capped at `max_interval`.
    #[must_use]
    pub fn new(max_interval: Duration) -> Self {
        Self {
            max_interval,
            items: HashMap::new(),
        }
    }

    /// Record a failure of `key` and return how long to wait before requeueing it.
    pub fn when(&mut self, key: &str) -> Duration {
        let max_interval = self.max_interval;
        let backoff = self
            .items
            .entry(key.to_string())
            .or_insert_with(|| queue_backoff(max_interval));

        // Unbounded retries, so next_backoff always yields
        backoff.next_backoff().unwrap_or(max_interval)
    }

    /// Clear the failure history of `key`.
    pub fn forget(&mut self, key: &str) {
        self.items.remove(key);
    }

    /// Number of consecutive failures recorded for `key`.
    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.items.get(key).map_or(0, ExponentialBackoff::retries)
    }
}

/// Retry a read-modify-write Kubernetes API call while it fails with HTTP 409.
///
/// Every other error is returned immediately. The operation must re-read the object
/// on every call so the retried write carries a fresh `resourceVersion`.
///
/// # Errors
///
/// Returns the last error once the conflict budget is spent, or the first non-conflict
/// error.
pub async fn retry_on_conflict<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = conflict_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after conflict retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if is_conflict(&e) => {
                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        "Conflict writing object, retrying with a fresh read"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Conflict retries exhausted, giving up"
                    );
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
