/// Bounded retry with exponential backoff and full jitter.
///
/// Every RPC call goes through `with_retry`. Only errors for which
/// `FerretError::is_transient` holds are retried; anything else is returned
/// on the first attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::RpcSettings;
use crate::error::{FerretError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RpcSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RpcSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.backoff_base_ms),
            max_delay: Duration::from_millis(settings.backoff_max_ms),
            attempt_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// random(0, min(max_delay, base_delay * 2^(attempt-1)))
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exp = (self.base_delay.as_millis() as u64)
            .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1) as u32));
        let capped = exp.min(self.max_delay.as_millis() as u64);
        let jittered = rand::thread_rng().gen_range(0..=capped);
        Duration::from_millis(jittered)
    }
}

pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, label: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(FerretError::Timeout(policy.attempt_timeout.as_millis() as u64)),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_transient() {
            return Err(err);
        }

        if attempt >= policy.max_attempts {
            warn!(call = label, attempts = attempt, error = %err, "Retries exhausted");
            return Err(FerretError::RetriesExhausted {
                attempts: attempt,
                last_error: err.to_string(),
            });
        }

        let delay = policy.backoff(attempt);
        debug!(
            call = label,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, backing off"
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(5000),
            attempt_timeout: Duration::from_secs(1),
        };
        assert!(policy.backoff(1) <= Duration::from_millis(50));
        assert!(policy.backoff(3) <= Duration::from_millis(200));
        assert!(policy.backoff(40) <= Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = with_retry(&fast_policy(3), "ok", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FerretError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_recovers() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = with_retry(&fast_policy(3), "flaky", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(FerretError::Timeout(10))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(3), "down", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FerretError::HttpStatus { method: "getTransaction".into(), status: 503 })
        })
        .await;
        assert!(matches!(result, Err(FerretError::RetriesExhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(5), "bad-params", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FerretError::Rpc { method: "m".into(), code: -32602, message: "invalid".into() })
        })
        .await;
        assert!(matches!(result, Err(FerretError::Rpc { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
