#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions shared by the graphkit crates.
//!
//! - **Backoff strategies** via the [`BackoffStrategy`](retry::BackoffStrategy) trait
//!   and the [`ExponentialBackoff`](retry::ExponentialBackoff) implementation
//! - **Cancellable delays** via [`sleep_or_cancelled`](cancel::sleep_or_cancelled),
//!   so that a backoff wait unwinds as soon as the caller's token fires
//! - **Declarative error boundaries** via the `error_boundary!` macro
//!
//! # Examples
//!
//! ```rust
//! use graphkit_core::prelude::*;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .initial_delay(Duration::from_secs(10))
//!     .jitter(0.0)
//!     .build();
//!
//! // 10s * 2^1
//! assert_eq!(backoff.next_delay(1), Some(Duration::from_secs(20)));
//! ```

pub mod cancel;
pub mod error;
pub mod retry;

/// Convenient re-exports of commonly used items.
pub mod prelude {
    pub use crate::cancel::{Cancelled, sleep_or_cancelled};
    pub use crate::error_boundary;
    pub use crate::retry::{BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder};
    pub use tokio_util::sync::CancellationToken;
}
