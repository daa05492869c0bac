//! Retry middleware for throttled responses
//!
//! `429 Too Many Requests` and `503 Service Unavailable` are retried after the
//! delay the service asks for in `Retry-After`, or after an exponential
//! backoff when it does not say.

use super::middleware::{Middleware, MiddlewareKind, Next, RequestContext};
use crate::error::{Error, Result};
use async_trait::async_trait;
use graphkit_core::cancel::sleep_or_cancelled;
use graphkit_core::retry::{BackoffStrategy, ExponentialBackoff};
use graphkit_transport::{HttpRequest, HttpResponse};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of retries per request.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default base delay of the exponential backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Header carrying the retry number on re-sent requests.
pub const RETRY_ATTEMPT: HeaderName = HeaderName::from_static("retry-attempt");

/// Decides whether a retry happens, given the delay, the 1-based attempt and the response.
pub type ShouldRetry = Arc<dyn Fn(Duration, u32, &HttpResponse) -> bool + Send + Sync>;

/// Retry behaviour.
#[derive(Clone)]
pub struct RetryOptions {
    max_retries: u32,
    delay: Duration,
    should_retry: Option<ShouldRetry>,
}

impl RetryOptions {
    /// Options with `max_retries` retries and the given base delay.
    ///
    /// `max_retries == 0` disables retrying.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            should_retry: None,
        }
    }

    /// Only retry when `predicate` returns true.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Duration, u32, &HttpResponse) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Base delay of the exponential backoff.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a `should_retry` predicate is set.
    pub fn has_should_retry(&self) -> bool {
        self.should_retry.is_some()
    }

    /// Whether these options equal [`RetryOptions::default`].
    pub(crate) fn is_default(&self) -> bool {
        self.max_retries == DEFAULT_MAX_RETRIES
            && self.delay == DEFAULT_RETRY_DELAY
            && self.should_retry.is_none()
    }

    /// Set the maximum number of retries.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    /// Set the base delay.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    fn allows(&self, delay: Duration, attempt: u32, response: &HttpResponse) -> bool {
        self.should_retry
            .as_ref()
            .is_none_or(|predicate| predicate(delay, attempt, response))
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .field("should_retry", &self.should_retry.is_some())
            .finish()
    }
}

/// Retries throttled responses.
///
/// Requests whose body has no known length (streams) are sent once; the
/// throttled response is returned to the caller.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    options: RetryOptions,
    backoff: ExponentialBackoff,
}

impl RetryMiddleware {
    /// Create a retry middleware with the given options.
    pub fn new(options: RetryOptions) -> Self {
        let backoff = ExponentialBackoff::builder()
            .max_retries(options.max_retries)
            .initial_delay(options.delay)
            .multiplier(2.0)
            .jitter(0.0)
            .build();
        Self { options, backoff }
    }

    /// Delay before retry number `attempt`.
    fn delay_for(&self, attempt: u32, response: &HttpResponse) -> Option<Duration> {
        retry_after(&response.headers).or_else(|| self.backoff.next_delay(attempt))
    }
}

impl Default for RetryMiddleware {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

/// Whether `status` is a throttling status this middleware retries.
pub fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Parse `Retry-After` as delta-seconds or as an HTTP-date.
///
/// A date in the past yields a zero delay.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn kind(&self) -> MiddlewareKind {
        MiddlewareKind::Retry
    }

    async fn handle(
        &self,
        request: HttpRequest,
        ctx: &RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse> {
        let replayable = request.body.is_replayable();
        let mut response = next.run(request.clone(), ctx).await?;

        if self.options.max_retries == 0 || !replayable {
            return Ok(response);
        }

        let mut attempt = 0;
        while is_retryable(response.status) {
            if !self.backoff.allows(attempt + 1) {
                tracing::warn!(
                    url = %request.url,
                    status = response.status.as_u16(),
                    attempts = attempt,
                    "Retry limit reached"
                );
                return Err(Error::TooManyRetries {
                    attempts: attempt,
                    status: response.status.as_u16(),
                });
            }
            attempt += 1;

            let Some(delay) = self.delay_for(attempt, &response) else {
                return Ok(response);
            };
            if !self.options.allows(delay, attempt, &response) {
                return Ok(response);
            }

            tracing::debug!(
                url = %request.url,
                status = response.status.as_u16(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying throttled request"
            );

            sleep_or_cancelled(delay, &ctx.cancellation).await?;

            let mut retry = request.clone();
            retry
                .headers
                .insert(RETRY_ATTEMPT, HeaderValue::from(attempt));
            response = next.run(retry, ctx).await?;
        }

        Ok(response)
    }
}
