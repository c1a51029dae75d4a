// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{WalletError, WalletResult};

/// Exponential retry strategy used around every operation that must commit
/// atomically (batch persist, broadcast persist, notify phases).
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy {
    pub min: Duration,
    pub max: Duration,
    pub max_jitter: Duration,
    pub attempts: usize,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(20),
            max_jitter: Duration::from_millis(250),
            attempts: 10,
        }
    }
}

impl RetryStrategy {
    fn jitter_factor(&self) -> f64 {
        if self.min.is_zero() {
            return 0.0;
        }
        (self.max_jitter.as_secs_f64() / self.min.as_secs_f64()).clamp(0.0, 1.0)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.min,
            randomization_factor: self.jitter_factor(),
            multiplier: 2.0,
            max_interval: self.max,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Run `op` until it succeeds, the strategy's attempts are exhausted, the
/// error is not retryable, or `cancel` fires mid-sleep.
pub async fn retry_with_backoff<T, F, Fut>(
    strategy: &RetryStrategy,
    cancel: &CancellationToken,
    mut op: F,
) -> WalletResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WalletResult<T>>,
{
    let mut backoff = strategy.backoff();
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= strategy.attempts => {
                return Err(WalletError::Transient(format!(
                    "giving up after {attempt} attempts: {err}"
                )))
            }
            Err(err) => {
                let delay = backoff.next_backoff().unwrap_or(strategy.max);
                debug!(attempt, ?delay, error = %err, "retrying after error");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(WalletError::Transient(format!(
                            "cancelled during retry: {err}"
                        )));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result = retry_with_backoff(
            &RetryStrategy::default(),
            &CancellationToken::new(),
            move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WalletError>(42u64)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result = retry_with_backoff(
            &RetryStrategy::default(),
            &CancellationToken::new(),
            move || {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err(WalletError::Transient("db busy".into()))
                    } else {
                        Ok(7u64)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result: WalletResult<()> = retry_with_backoff(
            &RetryStrategy::default(),
            &CancellationToken::new(),
            move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(WalletError::Validation("bad amount".into()))
                }
            },
        )
        .await;
        assert!(matches!(result, Err(WalletError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let strategy = RetryStrategy {
            attempts: 3,
            ..Default::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let result: WalletResult<()> =
            retry_with_backoff(&strategy, &CancellationToken::new(), move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(WalletError::Transient("still down".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(WalletError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retry_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: WalletResult<()> = retry_with_backoff(
            &RetryStrategy::default(),
            &cancel,
            || async { Err(WalletError::Transient("down".into())) },
        )
        .await;
        assert!(matches!(result, Err(WalletError::Transient(_))));
    }
}
