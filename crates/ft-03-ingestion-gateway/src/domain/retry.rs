//! # Publish Retry Policy
//!
//! Exponential backoff with jitter, bounded by attempt count.

use rand::Rng;
use std::time::Duration;

/// How the gateway retries transient publish failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,

    /// Backoff before the first retry.
    pub initial_backoff: Duration,

    /// Upper bound on any single backoff.
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential increase.
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0) for randomizing backoff.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based):
    /// `initial * multiplier^(attempt-1)`, capped at `max_backoff`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as f64;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powf(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }

    /// Delay after failed attempt `attempt`, with ±jitter applied.
    pub fn backoff(&self, attempt: u32) -> Duration {
        apply_jitter(self.base_backoff(attempt), self.jitter)
    }
}

/// Jitter is applied as ±factor randomness, e.g. 100ms with 0.25 jitter
/// lands in 75ms..=125ms.
fn apply_jitter(duration: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || duration.is_zero() {
        return duration;
    }
    let secs = duration.as_secs_f64();
    let spread = secs * factor.min(1.0);
    let jittered = rand::thread_rng().gen_range((secs - spread)..=(secs + spread));
    Duration::from_secs_f64(jittered.max(0.0))
}
