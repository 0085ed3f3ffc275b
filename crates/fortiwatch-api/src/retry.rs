// Bounded exponential-backoff retry for transient upstream failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;

/// Retry configuration for monitor fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for each subsequent one.
    /// Default: 1s.
    pub initial_backoff: Duration,

    /// Upper bound on any single delay. Default: 30s.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// `delay = min(initial * 2^retry, max)`, so the default schedule is
    /// 1s, 2s, 4s, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent.
    ///
    /// Client errors surface immediately and unchanged. A transient error
    /// on the final attempt is wrapped in [`Error::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(Error::RetriesExhausted {
                        resource: label.to_owned(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt - 1);
                    warn!(
                        label,
                        attempt,
                        error = %e,
                        "transient failure, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn server_error() -> Error {
        Error::Http {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[test]
    fn default_schedule_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
        assert_eq!(policy.backoff(64), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_uses_every_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), Error> = RetryPolicy::default()
            .run("fortiswitches", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Sleeps of 1s and 2s between the three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        match result.unwrap_err() {
            Error::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.status(), Some(503));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), Error> = RetryPolicy::default()
            .run("fortiaps", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(Error::Http {
                        status: 404,
                        message: "not found".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(result, Err(Error::Http { status: 404, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_second_attempt() {
        let calls = AtomicU32::new(0);

        let value = RetryPolicy::default()
            .run("system_status", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Error::RateLimited {
                            retry_after_secs: None,
                        })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_wraps_transient() {
        let result: Result<(), Error> = RetryPolicy::none()
            .run("endpoints", || async { Err(server_error()) })
            .await;
        assert!(matches!(
            result,
            Err(Error::RetriesExhausted { attempts: 1, .. })
        ));
    }
}
