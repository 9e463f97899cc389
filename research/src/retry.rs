//! RetryExecutor - exponential backoff with jitter over a fallible operation

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;
use crate::events::{Event, EventEmitter};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 10_000,
            retryable_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// `min(initial * multiplier^attempt, maxDelayMs)` with +/-10% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let computed = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = computed.min(self.max_delay_ms as f64);
        let jitter = 1.0 + (rand::random::<f64>() * 0.2 - 0.1);
        Duration::from_millis((capped * jitter).max(0.0) as u64)
    }
}

/// Runs `operation` under `policy`, emitting a `retrying` event for each retry.
///
/// `url` and `emitter` are optional: callers outside the URL-fetch pipeline
/// (e.g. a plain retrying LLM call) can pass `None` to skip event emission.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    url: Option<&str>,
    emitter: Option<&EventEmitter>,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable(&policy.retryable_status_codes) || attempt >= policy.max_retries {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                attempt += 1;
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying after transient error");
                if let (Some(url), Some(emitter)) = (url, emitter) {
                    emitter.emit(Event::Retrying {
                        run_id: emitter.run_id().to_string(),
                        url: url.to_string(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    });
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn delay_for_attempt_is_bounded_by_max() {
        let policy = RetryPolicy { max_delay_ms: 1000, ..RetryPolicy::default() };
        for attempt in 0..20 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay.as_millis() <= 1100, "attempt {attempt} delay {delay:?} exceeds cap plus jitter");
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_without_retry() {
        let policy = RetryPolicy { initial_delay_ms: 0, ..RetryPolicy::default() };
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = retry_with_backoff(&policy, None, None, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, FetchError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let policy = RetryPolicy { initial_delay_ms: 0, ..RetryPolicy::default() };
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = retry_with_backoff(&policy, None, None, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::ClientError { status: 404, message: "not found".into() })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let policy = RetryPolicy { initial_delay_ms: 0, max_retries: 3, ..RetryPolicy::default() };
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = retry_with_backoff(&policy, None, None, || {
            let c = c.clone();
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(FetchError::Timeout(Duration::from_millis(1)))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_last_error() {
        let policy = RetryPolicy { initial_delay_ms: 0, max_retries: 2, ..RetryPolicy::default() };
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, _> = retry_with_backoff(&policy, None, None, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::ServerError { status: 500, message: "boom".into() })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // first attempt + 2 retries
    }
}
