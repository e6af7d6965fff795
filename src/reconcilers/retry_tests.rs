// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{retry_on_conflict, status_update_backoff, BackoffPolicy, Retryable};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Conflict,
        Fatal,
        GaveUp(u32),
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, Self::Conflict)
        }

        fn exhausted(self, attempts: u32) -> Self {
            Self::GaveUp(attempts)
        }
    }

    fn instant_policy(steps: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            multiplier: 2.0,
            randomization_factor: 0.0,
            steps,
        }
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let policy = status_update_backoff();

        assert_eq!(policy.initial_interval, Duration::from_millis(10));
        assert_eq!(policy.max_interval, Duration::from_secs(1));
        assert_eq!(policy.steps, 4);

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(policy.multiplier, 5.0);
            assert_eq!(policy.randomization_factor, 0.1);
        }
    }

    /// Test the interval sequence without jitter
    #[test]
    fn test_backoff_grows_and_stops_after_steps() {
        let policy = BackoffPolicy {
            randomization_factor: 0.0,
            ..status_update_backoff()
        };
        let mut backoff = policy.start();

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(50)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.attempts(), 4);
    }

    /// Test that intervals never exceed the cap
    #[test]
    fn test_backoff_caps_interval() {
        let policy = BackoffPolicy {
            initial_interval: Duration::from_millis(600),
            randomization_factor: 0.0,
            steps: 5,
            ..status_update_backoff()
        };
        let mut backoff = policy.start();

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(600)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
    }

    /// Test that jitter stays within ±10%
    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let mut backoff = status_update_backoff().start();
            let interval = backoff.next_backoff().unwrap();
            assert!(interval >= Duration::from_millis(8), "{interval:?}");
            assert!(interval <= Duration::from_millis(12), "{interval:?}");
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_conflicts() {
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict(&instant_policy(4), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TestError::Conflict)
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_conflict(&instant_policy(4), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal)
        })
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_reports_exhaustion() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_conflict(&instant_policy(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Conflict)
        })
        .await;

        assert_eq!(result, Err(TestError::GaveUp(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
