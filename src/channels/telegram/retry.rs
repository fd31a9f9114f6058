//! Backoff policy for Telegram Bot API calls

use std::time::{Duration, SystemTime};

/// How often and how patiently a failed call is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether attempt number `attempt` (0-based) may be followed by another
    #[must_use]
    pub const fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before retrying after attempt `attempt` (0-based)
    ///
    /// A server-provided `retry_after` wins over the exponential schedule.
    /// Both are capped at `max_delay`. The exponential delay gets up to 25%
    /// jitter so concurrent tasks don't retry in lockstep.
    #[must_use]
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(server) = retry_after {
            return server.min(self.max_delay);
        }

        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_micros();
        let jitter = exponential.mul_f64(f64::from(seed % 251) / 1000.0);

        (exponential + jitter).min(self.max_delay)
    }
}

/// Whether a failed call is worth repeating
///
/// Rate limits and server errors are; client errors are not.
#[must_use]
pub const fn is_recoverable(status: u16) -> bool {
    status == 429 || (status >= 500 && status < 600)
}

/// Read `parameters.retry_after` (seconds) from a Telegram error body
#[must_use]
pub fn parse_retry_after(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/parameters/retry_after")
        .and_then(serde_json::Value::as_u64)
        .map(Duration::from_secs)
}
