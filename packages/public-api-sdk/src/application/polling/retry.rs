//! Fetch retry policy.
//!
//! Transient failures (connection, timeout, transport, rate limiting) are
//! retried up to `max_retries` times when `retry_on_error` is set. The delay
//! starts at one time unit and doubles per retry with exponential backoff,
//! or stays at one unit otherwise. Non-transient failures and exhausted
//! retries degrade the cycle to an empty result; the next cycle tries again.
//!
//! # Retryable Errors
//!
//! | Retryable | Non-Retryable |
//! |-----------|---------------|
//! | Connection refused/reset | HTTP 400/422 (Validation) |
//! | Request timeout | HTTP 401/403 (Authentication) |
//! | HTTP 408/5xx (Transport) | HTTP 404 (Not found) |
//! | HTTP 429 (Rate limited) | Undecodable response |

use std::sync::Arc;
use std::time::Duration;

use super::source::PollSource;
use crate::domain::subscription::SubscriptionConfig;
use crate::infrastructure::metrics;

/// Backoff calculator for one fetch call.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    unit: Duration,
    retry_on_error: bool,
    max_retries: u32,
    exponential: bool,
    retries: u32,
}

impl RetryBackoff {
    /// Create a backoff from a subscription config and the base time unit.
    #[must_use]
    pub const fn new(config: &SubscriptionConfig, unit: Duration) -> Self {
        Self {
            unit,
            retry_on_error: config.retry_on_error(),
            max_retries: config.max_retries(),
            exponential: config.exponential_backoff(),
            retries: 0,
        }
    }

    /// Delay before the next retry.
    ///
    /// Returns `None` if retrying is disabled or retries are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.retry_on_error || self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        if self.exponential {
            Some(self.unit.saturating_mul(1 << (self.retries - 1)))
        } else {
            Some(self.unit)
        }
    }

    /// Number of retries handed out so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }
}

/// Fetch `keys` from `source` on the blocking pool, retrying transient
/// failures per `config`.
///
/// Never fails: every unrecoverable outcome yields an empty result.
pub(crate) async fn fetch_with_retry<S: PollSource>(
    source: &Arc<S>,
    keys: Vec<S::Key>,
    config: &SubscriptionConfig,
    unit: Duration,
) -> Vec<(S::Key, S::Value)> {
    let keys = Arc::new(keys);
    let mut backoff = RetryBackoff::new(config, unit);

    loop {
        let attempt = backoff.retries() + 1;
        let task_source = Arc::clone(source);
        let task_keys = Arc::clone(&keys);
        let outcome = tokio::task::spawn_blocking(move || task_source.fetch(&task_keys)).await;

        let err = match outcome {
            Ok(Ok(values)) => return values,
            Ok(Err(err)) => err,
            Err(join_err) => {
                tracing::error!(
                    source = S::NAME,
                    attempt,
                    error = %join_err,
                    "Fetch task panicked, skipping cycle"
                );
                return Vec::new();
            }
        };

        let transient = err.is_transient();
        metrics::record_fetch_failure(S::NAME, transient);

        if !transient {
            tracing::warn!(
                source = S::NAME,
                attempt,
                error = %err,
                "Fetch failed with non-retryable error, skipping cycle"
            );
            return Vec::new();
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::error!(
                source = S::NAME,
                attempt,
                error = %err,
                "Fetch failed, retries exhausted, skipping cycle"
            );
            return Vec::new();
        };

        metrics::record_retry(S::NAME);
        tracing::warn!(
            source = S::NAME,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Fetch failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
