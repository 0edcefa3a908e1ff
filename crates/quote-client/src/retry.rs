use std::future::Future;
use std::time::Duration;

use dashboard_core::QuoteError;

use crate::governor::{wait_for_admission, RateGovernor};

/// Retry schedule for transient provider failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Run `op` under the governor, retrying transient failures with
/// exponential backoff. Every attempt re-consults the governor for a
/// fresh slot and records its outcome; a backoff sleep alone is not
/// enough to cross a closed minute window.
pub async fn call_with_retry<T, F, Fut>(
    governor: &RateGovernor,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, QuoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QuoteError>>,
{
    let mut attempt = 0;
    loop {
        wait_for_admission(governor).await;
        match op().await {
            Ok(value) => {
                governor.record(true).await;
                return Ok(value);
            }
            Err(err) => {
                governor.record(false).await;
                attempt += 1;
                if attempt >= policy.max_attempts || !err.is_transient() {
                    return Err(err);
                }
                let delay = policy.base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
