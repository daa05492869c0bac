//! Exponential backoff with optional jitter.

use super::strategy::BackoffStrategy;
use std::time::Duration;

/// Exponential backoff strategy with configurable jitter.
///
/// # Formula
///
/// For attempt `n`:
/// ```text
/// base_delay = initial_delay * (multiplier ^ n)
/// jittered   = base_delay + base_delay * jitter * random(-1.0, +1.0)
/// final      = min(jittered, max_delay)        // when a cap is set
/// ```
///
/// The HTTP retry middleware numbers retries from 1, so with the defaults of
/// that middleware (10s, multiplier 2, no jitter) the first retry waits 20s,
/// the second 40s, and so on.
///
/// # Examples
///
/// ```rust
/// use graphkit_core::retry::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::builder()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(30))
///     .multiplier(2.0)
///     .jitter(0.0)
///     .build();
///
/// assert_eq!(backoff.next_delay(3), Some(Duration::from_millis(800)));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Option<Duration>,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// The base delay that is multiplied on every attempt.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }
}

impl Default for ExponentialBackoff {
    /// Defaults:
    /// - `max_retries`: 3
    /// - `initial_delay`: 100ms
    /// - `max_delay`: none
    /// - `multiplier`: 2.0
    /// - `jitter`: 0.0
    fn default() -> Self {
        ExponentialBackoffBuilder::default().build()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        let jittered = if self.jitter > 0.0 {
            let jitter_amount = base_delay * self.jitter * (rand::random::<f64>() - 0.5) * 2.0;
            base_delay + jitter_amount
        } else {
            base_delay
        };

        let capped = match self.max_delay {
            Some(max) => jittered.min(max.as_secs_f64()),
            None => jittered,
        };

        Duration::try_from_secs_f64(capped.max(0.0)).ok()
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Builder for configuring [`ExponentialBackoff`].
#[derive(Debug, Default)]
pub struct ExponentialBackoffBuilder {
    max_retries: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
}

impl ExponentialBackoffBuilder {
    /// Set the maximum number of retry attempts.
    ///
    /// Default: 3
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the base delay.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Cap every computed delay at `delay`.
    ///
    /// Default: uncapped
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential multiplier.
    ///
    /// Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Set the jitter factor, clamped to `0.0..=1.0`.
    ///
    /// Default: 0.0 (deterministic delays)
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter.clamp(0.0, 1.0));
        self
    }

    /// Build the `ExponentialBackoff` instance.
    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            max_retries: self.max_retries.unwrap_or(3),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_millis(100)),
            max_delay: self.max_delay,
            multiplier: self.multiplier.unwrap_or(2.0),
            jitter: self.jitter.unwrap_or(0.0),
        }
    }
}
