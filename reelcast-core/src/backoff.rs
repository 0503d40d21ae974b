//! Exponential backoff for transient transport errors: `250ms * 2^n`
//! clamped to 5s, with jitter, up to a fixed attempt budget. A reusable
//! policy plus a `retry` driver instead of a single hardcoded call site.

use crate::error::{ReelcastError, Result};
use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before the `attempt`-th retry (0-indexed: the delay before
    /// the *second* overall try is `delay_for(0)`), with up to 20% jitter
    /// applied on top of the exponential base.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_delay);
        let jitter_frac = rand::random::<f64>() * 0.2;
        capped.mul_f64(1.0 + jitter_frac)
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between attempts
/// per [`BackoffPolicy::delay_for`]. Only [`ReelcastError::is_retryable`]
/// errors are retried; anything else returns immediately.
pub async fn retry<T, F, Fut>(policy: BackoffPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
