//! Exponential-backoff retry for transient transport failures.
//!
//! Every outbound request goes through [`with_retry`]. Only errors that
//! [`TransportError::is_transient`] accepts are retried; anything else is
//! returned on the first attempt. When the attempt budget is spent the last
//! error is returned unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::TransportError;

/// Retry budget and backoff shape for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// A policy with the given retry count and delay bounds.
    pub const fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            multiplier: 2,
        }
    }

    /// Total attempts, including the first.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (zero-based), capped at
    /// `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(800), Duration::from_secs(120))
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy's
/// attempt budget is spent.
///
/// `label` names the request in retry logs.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut retry: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry < policy.max_retries => {
                let delay = policy.backoff_for(retry);
                retry = retry.saturating_add(1);
                warn!(
                    request = label,
                    attempt = retry,
                    max_retries = policy.max_retries,
                    backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
