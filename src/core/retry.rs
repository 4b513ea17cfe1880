//! Retry engine
//!
//! Bounded-attempt exponential backoff around one provider's executor calls.
//! Deterministic given its inputs (no jitter), which keeps delay math and
//! attempt counts testable.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::providers::error::ProviderError;

/// Backoff policy for one provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts, including the first; values below 1 behave as 1
    pub max_attempts: u32,
    /// Delay before the second attempt; 0 disables delays entirely
    pub base_delay_ms: u64,
    /// Multiplier applied per additional attempt
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based; the first attempt never
    /// waits): `base_delay_ms × backoff_factor^(attempt−2)`, rounded to the
    /// nearest millisecond.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2) as i32;
        let millis = (self.base_delay_ms as f64) * self.backoff_factor.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Run `op` up to `policy.max_attempts` times.
///
/// A non-retryable error (configuration) stops immediately; otherwise the
/// last error is returned after the final attempt. The closure receives the
/// 1-based attempt number.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(
                    provider = err.provider(),
                    attempt,
                    max_attempts,
                    error = %err,
                    "provider attempt failed"
                );
                let retryable = err.is_retryable();
                last_error = Some(err);
                if !retryable {
                    break;
                }
            }
        }
    }

    // max_attempts >= 1, so at least one attempt ran and set last_error
    Err(last_error.expect("retry loop ran no attempts"))
}
