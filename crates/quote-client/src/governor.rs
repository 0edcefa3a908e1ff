use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use dashboard_core::QuoteSource;
use tokio::sync::Mutex;

const DELAY_CEILING_SECS: f64 = 300.0;
const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_DAY: i64 = 24 * 3600;

/// Per-provider call ceilings and the starting inter-call spacing
#[derive(Debug, Clone, Copy)]
pub struct GovernorLimits {
    pub calls_per_minute: u32,
    pub calls_per_day: u32,
    pub floor_delay_secs: f64,
}

impl GovernorLimits {
    /// Free-tier limits for each supported source. Yahoo has no
    /// published quota but still gets a minimal spacing.
    pub fn for_source(source: QuoteSource) -> Self {
        match source {
            QuoteSource::Yahoo => Self {
                calls_per_minute: 60,
                calls_per_day: 10_000,
                floor_delay_secs: 1.0,
            },
            QuoteSource::AlphaVantage => Self {
                calls_per_minute: 5,
                calls_per_day: 500,
                floor_delay_secs: 12.0,
            },
            QuoteSource::Polygon => Self {
                calls_per_minute: 5,
                calls_per_day: 1_000,
                floor_delay_secs: 12.0,
            },
        }
    }
}

/// Outcome of asking the governor for a call slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Ready,
    RetryAfter(Duration),
}

#[derive(Debug)]
struct GovernorState {
    minute_calls: HashMap<i64, u32>,
    day_calls: HashMap<i64, u32>,
    last_call_at: f64,
    delay_secs: f64,
}

/// Adaptive rate governor. Tracks per-minute and per-day call counts
/// in epoch-keyed buckets and keeps an inter-call delay that shrinks
/// on success and grows on failure.
///
/// `admit` never sleeps; callers that want to block use
/// [`wait_for_admission`].
pub struct RateGovernor {
    limits: GovernorLimits,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    pub fn new(limits: GovernorLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(GovernorState {
                minute_calls: HashMap::new(),
                day_calls: HashMap::new(),
                last_call_at: 0.0,
                delay_secs: limits.floor_delay_secs,
            }),
        }
    }

    pub fn for_source(source: QuoteSource) -> Self {
        Self::new(GovernorLimits::for_source(source))
    }

    /// Check whether a call may go out now. Checks the daily ceiling,
    /// then the minute ceiling, then the inter-call spacing, and
    /// reports the first blocking wait.
    pub async fn admit(&self) -> Admission {
        self.admit_at(epoch_now()).await
    }

    /// Record the outcome of a call that was actually issued. Bumps
    /// both counters, stamps the call time, adapts the delay, and
    /// prunes buckets older than an hour (minutes) and a week (days).
    pub async fn record(&self, success: bool) {
        self.record_at(epoch_now(), success).await
    }

    pub async fn current_delay_secs(&self) -> f64 {
        self.state.lock().await.delay_secs
    }

    pub(crate) async fn admit_at(&self, now: f64) -> Admission {
        let state = self.state.lock().await;
        let current_minute = now as i64 / SECS_PER_MINUTE;
        let current_day = now as i64 / SECS_PER_DAY;

        let daily = state.day_calls.get(&current_day).copied().unwrap_or(0);
        if daily >= self.limits.calls_per_day {
            let reset_at = ((current_day + 1) * SECS_PER_DAY) as f64;
            let wait = (reset_at - now).max(1.0);
            tracing::warn!(
                calls = daily,
                wait_secs = wait as u64,
                "daily call ceiling reached"
            );
            return Admission::RetryAfter(Duration::from_secs_f64(wait));
        }

        let this_minute = state.minute_calls.get(&current_minute).copied().unwrap_or(0);
        if this_minute >= self.limits.calls_per_minute {
            let wait = (SECS_PER_MINUTE as f64 - (now % SECS_PER_MINUTE as f64)).max(1.0);
            tracing::debug!(
                calls = this_minute,
                wait_secs = wait as u64,
                "per-minute call ceiling reached"
            );
            return Admission::RetryAfter(Duration::from_secs_f64(wait));
        }

        let since_last = now - state.last_call_at;
        if since_last < state.delay_secs {
            let wait = state.delay_secs - since_last;
            return Admission::RetryAfter(Duration::from_secs_f64(wait));
        }

        Admission::Ready
    }

    pub(crate) async fn record_at(&self, now: f64, success: bool) {
        let mut state = self.state.lock().await;
        let current_minute = now as i64 / SECS_PER_MINUTE;
        let current_day = now as i64 / SECS_PER_DAY;

        *state.minute_calls.entry(current_minute).or_insert(0) += 1;
        *state.day_calls.entry(current_day).or_insert(0) += 1;
        state.last_call_at = now;

        if success {
            state.delay_secs = (state.delay_secs * 0.9).max(self.limits.floor_delay_secs);
        } else {
            state.delay_secs = (state.delay_secs * 1.5).min(DELAY_CEILING_SECS);
        }

        let hour_ago = current_minute - 60;
        state.minute_calls.retain(|&minute, _| minute > hour_ago);
        let week_ago = current_day - 7;
        state.day_calls.retain(|&day, _| day > week_ago);
    }

    #[cfg(test)]
    pub(crate) async fn calls_on_day(&self, now: f64) -> u32 {
        let state = self.state.lock().await;
        state
            .day_calls
            .get(&(now as i64 / SECS_PER_DAY))
            .copied()
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) async fn bucket_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.minute_calls.len(), state.day_calls.len())
    }
}

/// Block until the governor admits a call
pub async fn wait_for_admission(governor: &RateGovernor) {
    loop {
        match governor.admit().await {
            Admission::Ready => return,
            Admission::RetryAfter(wait) => {
                tracing::debug!(wait_secs = wait.as_secs_f64(), "waiting for call slot");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

fn epoch_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
