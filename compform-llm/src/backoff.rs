//! Exponential backoff between attempts.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::settings::ClientSettings;

/// Attempt budget and wait schedule of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base of the exponential wait, in seconds.
    pub backoff_base: f64,
    /// Add a uniform `[0, 1)` second jitter to each wait.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy described by client settings.
    #[must_use]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            max_retries: settings.max_retries(),
            backoff_base: settings.backoff_base(),
            jitter: settings.backoff_jitter(),
        }
    }

    /// Total attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether attempt `attempt` (0-based) may be followed by another.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Wait after attempt `attempt`: `backoff_base^attempt` seconds plus
    /// `jitter_sample` when jitter is on.
    #[must_use]
    pub fn delay(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut secs = self.backoff_base.powi(exponent);
        if self.jitter {
            secs += jitter_sample.clamp(0.0, 1.0);
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// [`RetryPolicy::delay`] with a fresh random jitter sample.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let sample = if self.jitter { rand::thread_rng().r#gen::<f64>() } else { 0.0 };
        self.delay(attempt, sample)
    }
}

/// Performs the wait between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
