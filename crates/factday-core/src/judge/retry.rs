//! Retry with backoff and a per-attempt timeout.
//!
//! Each attempt runs under `tokio::time::timeout`; an elapsed timeout drops
//! (cancels) the attempt's future and counts as a failed attempt. Only the
//! final failure is logged.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::JudgeError;
use crate::storage::{BackoffKind, RetryConfig};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffKind,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff: cfg.backoff,
            jitter_max: (cfg.jitter_ms > 0).then(|| Duration::from_millis(cfg.jitter_ms)),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: BackoffKind::Linear,
            jitter_max: None,
        }
    }

    /// Wait after the `failed_attempt`-th failure (1-based), before jitter.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let n = failed_attempt.max(1);
        let delay = match self.backoff {
            BackoffKind::Linear => self.base_delay.saturating_mul(n),
            BackoffKind::Exponential => {
                let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        match self.jitter_max {
            Some(max) if !max.is_zero() => {
                let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
                Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
            }
            _ => Duration::ZERO,
        }
    }
}

/// Run `f` until it succeeds or `policy.max_attempts` attempts have failed.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &'static str,
    timeout: Duration,
    mut f: F,
) -> Result<T, JudgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JudgeError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(JudgeError::Timeout {
                operation,
                after: timeout,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::warn!(operation, attempts = attempt, error = %e, "request failed");
                return Err(e);
            }
            Err(_) => {
                let wait = policy.delay_for(attempt).saturating_add(policy.jitter());
                tokio::time::sleep(wait).await;
            }
        }
    }
}
