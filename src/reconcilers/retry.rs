// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for optimistic status updates.
//!
//! Status writes race with other controllers touching the same `Bastion`. A
//! write based on a stale read is rejected by the API server with a conflict;
//! [`retry_on_conflict`] re-runs the whole read-modify-write closure after a
//! short, jittered, exponentially growing pause, for a bounded number of steps.
//!
//! Provider (Compute Engine) calls are never retried here; a failed pass is
//! retried as a whole by the controller.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Number of attempts made by the default status backoff
const STATUS_BACKOFF_STEPS: u32 = 4;

/// Initial retry interval (10ms)
const STATUS_INITIAL_INTERVAL_MILLIS: u64 = 10;

/// Maximum interval between retries (1 second)
const STATUS_MAX_INTERVAL_MILLIS: u64 = 1_000;

/// Backoff multiplier (exponential growth factor)
const STATUS_BACKOFF_MULTIPLIER: f64 = 5.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Shape of an exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// First pause
    pub initial_interval: Duration,
    /// Upper bound of a single pause
    pub max_interval: Duration,
    /// Backoff multiplier (5.0 grows 10ms to 50ms to 250ms)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Total number of attempts, including the first one
    pub steps: u32,
}

impl BackoffPolicy {
    /// Start a fresh backoff sequence for this policy.
    #[must_use]
    pub fn start(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            policy: *self,
            attempts: 1,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        status_update_backoff()
    }
}

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Debug)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    policy: BackoffPolicy,
    attempts: u32,
}

impl ExponentialBackoff {
    /// Get the next backoff interval, or None once all steps are used.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.steps {
            return None;
        }
        self.attempts += 1;

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.policy.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.policy.max_interval);

        Some(jittered)
    }

    /// Number of attempts handed out so far (the first attempt counts).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        let factor = self.policy.randomization_factor;
        if factor == 0.0 || interval.is_zero() {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * factor;
        let unit: f64 = rand::random();
        let jittered = (secs - delta) + unit * (2.0 * delta);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Default backoff for status writes.
///
/// # Configuration
///
/// - **Steps**: 4 attempts in total
/// - **Initial interval**: 10ms
/// - **Multiplier**: 5.0
/// - **Max interval**: 1 second
/// - **Randomization**: ±10% (prevents thundering herd)
///
/// # Retry Schedule
///
/// 1. immediately
/// 2. after ~10ms
/// 3. after ~50ms
/// 4. after ~250ms
#[must_use]
pub fn status_update_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial_interval: Duration::from_millis(STATUS_INITIAL_INTERVAL_MILLIS),
        max_interval: Duration::from_millis(STATUS_MAX_INTERVAL_MILLIS),
        multiplier: STATUS_BACKOFF_MULTIPLIER,
        randomization_factor: RANDOMIZATION_FACTOR,
        steps: STATUS_BACKOFF_STEPS,
    }
}

/// Errors that can tell a transient conflict from a permanent failure.
pub trait Retryable: Sized {
    /// `true` if re-reading and re-applying may succeed.
    fn is_retryable(&self) -> bool;

    /// Convert the last retryable error into the error reported once the
    /// backoff is used up.
    fn exhausted(self, attempts: u32) -> Self;
}

/// Run `operation` until it succeeds, fails permanently, or the backoff runs out.
///
/// Every attempt calls `operation` afresh, so a closure that performs a full
/// read-modify-write re-reads the latest object each time.
///
/// # Errors
///
/// - The first non-retryable error, unchanged
/// - `E::exhausted(attempts)` once every step hit a retryable error
pub async fn retry_on_conflict<T, E, F, Fut>(
    policy: &BackoffPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut backoff = policy.start();
    let start_time = Instant::now();

    loop {
        match operation().await {
            Ok(value) => {
                if backoff.attempts() > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = backoff.attempts(),
                        elapsed = ?start_time.elapsed(),
                        "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                error!(
                    operation = operation_name,
                    error = %e,
                    "Non-retryable error, failing immediately"
                );
                return Err(e);
            }
            Err(e) => {
                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = backoff.attempts() - 1,
                        retry_after = ?duration,
                        error = %e,
                        "Conflict, re-reading and retrying"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    let attempts = backoff.attempts();
                    error!(
                        operation = operation_name,
                        attempt = attempts,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e.exhausted(attempts));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
