//! The backoff strategy trait.

use std::time::Duration;

/// A strategy deciding how long to wait between retry attempts.
///
/// The strategy only computes delays; the caller owns the retry loop, because
/// what counts as "retryable" depends on the caller (a throttling status, a
/// connection error, ...).
///
/// # Examples
///
/// ```rust
/// use graphkit_core::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// struct Fixed(Duration);
///
/// impl BackoffStrategy for Fixed {
///     fn next_delay(&self, _attempt: u32) -> Option<Duration> {
///         Some(self.0)
///     }
///
///     fn max_retries(&self) -> u32 {
///         2
///     }
/// }
///
/// let fixed = Fixed(Duration::from_secs(1));
/// assert!(fixed.allows(2));
/// assert!(!fixed.allows(3));
/// ```
pub trait BackoffStrategy: Send + Sync {
    /// Delay before retry number `attempt`.
    ///
    /// `None` means no further retry should be attempted.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Maximum number of retries after the initial attempt.
    fn max_retries(&self) -> u32;

    /// Whether retry number `attempt` (1-based) is still within budget.
    fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_retries()
    }
}
