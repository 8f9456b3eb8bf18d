// sbdl-core/src/application/retry.rs

use std::time::Duration;

use crate::domain::project::PublisherSettings;
use crate::ports::broker::BrokerError;

/// Exponential backoff between delivery attempts of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PublisherSettings::default())
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            multiplier: multiplier.max(1.0),
        }
    }

    pub fn from_settings(settings: &PublisherSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
            settings.backoff_multiplier,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Another attempt is allowed after `attempts_made` failed with `error`.
    pub fn should_retry(&self, error: &BrokerError, attempts_made: u32) -> bool {
        error.is_transient() && attempts_made < self.max_attempts
    }

    /// Pause before the next attempt, `failed_attempts` counting from 1.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = i32::try_from(failed_attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(scaled as u64)
    }
}
