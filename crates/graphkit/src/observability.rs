//! Centralized observability utilities for structured logging
//!
//! Every hop through the pipeline is logged by the telemetry middleware
//! through this module; batch parsing reports per-step failures here too.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// HTTP request metadata for structured logging
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request body size in bytes (optional)
    pub body_size: Option<usize>,
    /// Retry number, when this hop is a retry
    pub attempt: Option<u32>,
    /// Correlation id sent to the service
    pub client_request_id: Option<String>,
}

impl RequestMetadata {
    /// Create new request metadata
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body_size: None,
            attempt: None,
            client_request_id: None,
        }
    }

    /// Set the request body size
    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }

    /// Set the retry number
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Set the correlation id
    pub fn with_client_request_id(mut self, id: impl Into<String>) -> Self {
        self.client_request_id = Some(id.into());
        self
    }

    /// Log request being sent
    pub fn log_request(&self) {
        debug!(
            method = %self.method,
            url = %self.url,
            body_size = self.body_size,
            attempt = self.attempt,
            client_request_id = self.client_request_id.as_deref(),
            "Sending HTTP request"
        );
    }

    /// Log a request that produced no response
    pub fn log_failure(&self, error: &str, elapsed: Duration) {
        warn!(
            method = %self.method,
            url = %self.url,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            attempt = self.attempt,
            "HTTP request failed without a response"
        );
    }
}

/// HTTP response metadata for structured logging
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status: u16,
    /// Response body size in bytes (optional)
    pub body_size: Option<usize>,
    /// Time elapsed for the request
    pub elapsed: Duration,
}

impl ResponseMetadata {
    /// Create new response metadata
    pub fn new(status: u16, elapsed: Duration) -> Self {
        Self {
            status,
            body_size: None,
            elapsed,
        }
    }

    /// Set the response body size
    pub fn with_body_size(mut self, size: usize) -> Self {
        self.body_size = Some(size);
        self
    }

    /// Log successful response
    pub fn log_success(&self, request: &RequestMetadata) {
        info!(
            method = %request.method,
            url = %request.url,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis() as u64,
            body_size = self.body_size,
            attempt = request.attempt,
            "HTTP request succeeded"
        );
    }

    /// Log failed response
    pub fn log_error(&self, request: &RequestMetadata, error: &str) {
        warn!(
            method = %request.method,
            url = %request.url,
            status = self.status,
            elapsed_ms = self.elapsed.as_millis() as u64,
            error = %error,
            attempt = request.attempt,
            "HTTP request failed"
        );
    }
}

/// Timer for measuring request duration
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Log a batch step that came back with a non-success status
pub fn log_batch_step_failed(step_id: &str, status: u16) {
    debug!(step_id = %step_id, status, "Batch step failed");
}

/// Log a batch step whose status is not a valid HTTP status
pub fn log_batch_step_invalid_status(step_id: &str, status: &serde_json::Value) {
    warn!(step_id = %step_id, status = %status, "Batch step has invalid status, treating as 502");
}

/// Log a parsed batch response
pub fn log_batch_parsed(steps: usize, failed: usize) {
    debug!(steps, failed, "Batch response parsed");
}

/// Install a `tracing-subscriber` formatter filtered by `RUST_LOG`.
///
/// Intended for binaries and examples; libraries should leave subscriber
/// setup to the application. Does nothing if a global subscriber is set.
#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphkit=info")),
        )
        .try_init();
}
