//! Backoff strategies.
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - how long to wait before a given retry, and how many retries to allow
//! - [`ExponentialBackoff`] - `initial_delay * multiplier^attempt`, optionally jittered and capped
//!
//! # Examples
//!
//! ```rust
//! use graphkit_core::retry::{BackoffStrategy, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .jitter(0.0)
//!     .build();
//!
//! assert_eq!(backoff.next_delay(2), Some(Duration::from_millis(400)));
//! ```

mod exponential;
mod strategy;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use strategy::BackoffStrategy;
