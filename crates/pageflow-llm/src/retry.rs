use std::time::Duration;

use tracing::warn;

use pageflow_core::config::RetryConfig;
use pageflow_core::error::{PageflowError, Result};
use pageflow_core::traits::Refiner;
use pageflow_core::types::Product;

/// A refiner that retries transient failures with exponential backoff.
pub struct RetryingRefiner {
    inner: Box<dyn Refiner>,
    retry_config: RetryConfig,
}

impl RetryingRefiner {
    pub fn new(inner: Box<dyn Refiner>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn is_retryable(e: &PageflowError) -> bool {
    match e {
        PageflowError::LlmRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("timed out")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = (config.initial_backoff_ms * 2u64.pow(attempt)).min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl Refiner for RetryingRefiner {
    fn refine(&self, question: &str, answer: &str, product: &Product) -> Result<Option<String>> {
        let max_retries = self.retry_config.max_retries;
        let mut attempt = 0;
        loop {
            match self.inner.refine(question, answer, product) {
                Ok(refined) => return Ok(refined),
                Err(e) if is_retryable(&e) && attempt < max_retries => {
                    let backoff = calculate_backoff(attempt, &self.retry_config);
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying refinement request"
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn label(&self) -> String {
        self.inner.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use pageflow_test_utils::sample_product;

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        error: fn() -> PageflowError,
        calls: Arc<AtomicU32>,
    }

    impl Refiner for Flaky {
        fn refine(&self, _q: &str, answer: &str, _p: &Product) -> Result<Option<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(Some(format!("{}!", answer)))
            }
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn flaky(failures: u32, error: fn() -> PageflowError) -> (RetryingRefiner, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = Flaky {
            failures,
            error,
            calls: calls.clone(),
        };
        (RetryingRefiner::new(Box::new(inner), fast_retry(2)), calls)
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&PageflowError::LlmRequest("HTTP 429 Too Many Requests: slow down".into())));
        assert!(is_retryable(&PageflowError::LlmRequest("HTTP 503 Service Unavailable: busy".into())));
        assert!(is_retryable(&PageflowError::LlmRequest("operation timed out".into())));
        assert!(!is_retryable(&PageflowError::LlmRequest("HTTP 401 Unauthorized: bad key".into())));
        assert!(!is_retryable(&PageflowError::LlmParse("expected value".into())));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        let first = calculate_backoff(0, &config).as_millis();
        assert!((80..=120).contains(&first));
        let capped = calculate_backoff(6, &config).as_millis();
        assert!((800..=1_200).contains(&capped));
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let (refiner, calls) = flaky(2, || PageflowError::LlmRequest("HTTP 502 Bad Gateway".into()));
        let out = refiner.refine("q", "a", &sample_product()).unwrap();
        assert_eq!(out.as_deref(), Some("a!"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let (refiner, calls) = flaky(10, || PageflowError::LlmRequest("connection refused".into()));
        assert!(refiner.refine("q", "a", &sample_product()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let (refiner, calls) = flaky(10, || PageflowError::LlmRequest("HTTP 401 Unauthorized".into()));
        assert!(refiner.refine("q", "a", &sample_product()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
