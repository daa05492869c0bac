//! Delays that observe a cancellation signal.

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The wait was interrupted because its cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// Sleep for `delay` unless `token` is cancelled first.
///
/// Returns immediately with [`Cancelled`] if the token is already cancelled,
/// without starting the timer.
///
/// # Examples
///
/// ```rust
/// use graphkit_core::cancel::{sleep_or_cancelled, Cancelled};
/// use tokio_util::sync::CancellationToken;
/// use std::time::Duration;
///
/// # async fn example() {
/// let token = CancellationToken::new();
/// token.cancel();
/// assert_eq!(
///     sleep_or_cancelled(Duration::from_secs(60), &token).await,
///     Err(Cancelled)
/// );
/// # }
/// ```
pub async fn sleep_or_cancelled(delay: Duration, token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
