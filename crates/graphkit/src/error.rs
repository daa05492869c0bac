//! Error types for the Graph SDK
//!
//! A single [`Error`] enum covers argument validation, transport failures,
//! redirect/retry protocol failures and errors reported by the service.

use crate::http::middleware::MiddlewareKind;
use graphkit_core::cancel::Cancelled;
use graphkit_core::error_boundary;
use graphkit_transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Result type alias for operations that can fail with a graphkit error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Graph SDK.
#[derive(Debug, Error)]
pub enum Error {
    /// A batch step was given an empty id.
    #[error("Batch step id must not be empty")]
    EmptyStepId,

    /// A batch already contains a step with this id.
    #[error("Batch already contains a step with id '{0}'")]
    DuplicateStepId(String),

    /// A batch is full.
    #[error("Batch cannot hold more than {max} steps")]
    BatchCapacityExceeded {
        /// Maximum number of steps per batch
        max: usize,
    },

    /// A step depends on a step that is not in the same batch.
    #[error("Step '{step_id}' depends on '{dependency}', which is not in the batch")]
    UnknownDependency {
        /// Step declaring the dependency
        step_id: String,
        /// Missing step id
        dependency: String,
    },

    /// The same middleware kind was registered twice.
    #[error("Middleware '{0}' appears more than once in the pipeline")]
    DuplicateMiddleware(MiddlewareKind),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid HTTP header name or value.
    #[error("Invalid HTTP header: {0}")]
    InvalidHeader(String),

    /// The network call failed.
    #[error("Service call failed: {source}")]
    ServiceCall {
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// The network call timed out.
    #[error("Request timed out: {source}")]
    Timeout {
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// A redirect response carried no `Location` header.
    #[error("Redirect response (status {status}) has no Location header")]
    MissingLocationHeader {
        /// Status of the redirect response
        status: u16,
    },

    /// The redirect limit was reached and the service is still redirecting.
    #[error("Too many redirects: gave up after {count}")]
    TooManyRedirects {
        /// Number of redirects followed
        count: u32,
    },

    /// The retry limit was reached and the service is still throttling.
    #[error("Too many retries: still {status} after {attempts} attempts")]
    TooManyRetries {
        /// Number of retries performed
        attempts: u32,
        /// Status of the last response
        status: u16,
    },

    /// A redirect needs to re-send a body that can only be sent once.
    #[error("Cannot follow redirect: request body is not replayable")]
    RedirectBodyNotReplayable,

    /// The `Location` header of a redirect is not a valid URL.
    #[error("Invalid redirect location: {0}")]
    InvalidRedirectLocation(String),

    /// The send was cancelled by the caller.
    #[error("Request was cancelled")]
    Cancelled,

    /// The service returned an error response.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A batch step body was not valid base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// No response exists for this step id.
    #[error("No response for batch step '{0}'")]
    StepNotFound(String),

    /// A token could not be obtained or may not be sent.
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl Error {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Service(err) => Some(err.status),
            Error::MissingLocationHeader { status } | Error::TooManyRetries { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this error is a transport timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

error_boundary!(Cancelled => Error, |_e| Error::Cancelled);

error_boundary!(TransportError => Error, |e| {
    if e.is_timeout() {
        Error::Timeout { source: e }
    } else {
        Error::ServiceCall { source: e }
    }
});

error_boundary!(url::ParseError => Error, |e| Error::InvalidUrl(e.to_string()));

error_boundary!(http::header::InvalidHeaderName => Error, |e| {
    Error::InvalidHeader(e.to_string())
});

error_boundary!(http::header::InvalidHeaderValue => Error, |e| {
    Error::InvalidHeader(e.to_string())
});

/// An error response returned by the service.
///
/// Parsed from the standard error body
/// `{"error":{"code":"…","message":"…","innerError":{…}}}`; when the body does
/// not have that shape the raw text becomes the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code
    pub status: u16,
    /// Service error code, e.g. `"Request_ResourceNotFound"`
    pub code: Option<String>,
    /// Error message
    pub message: String,
    /// `request-id` reported by the service
    pub request_id: Option<String>,
    /// `client-request-id` echoed by the service
    pub client_request_id: Option<String>,
    /// Timestamp reported by the service
    pub date: Option<String>,
    /// Id of the batch step this error belongs to
    pub step_id: Option<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error (status {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, ", code {code}")?;
        }
        if let Some(step_id) = &self.step_id {
            write!(f, ", step {step_id}")?;
        }
        write!(f, "): {}", self.message)
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// Create a service error from an HTTP response status, body and headers.
    pub fn from_response(status: u16, body: &[u8], headers: &http::HeaderMap) -> Self {
        let header_request_id = header_string(headers, "request-id");
        let header_client_request_id = header_string(headers, "client-request-id");
        let header_date = header_string(headers, "date");

        match serde_json::from_slice::<ApiErrorResponse>(body) {
            Ok(ApiErrorResponse { error }) => {
                let inner = error.inner_error.unwrap_or_default();
                Self {
                    status,
                    code: error.code,
                    message: error.message.unwrap_or_default(),
                    request_id: inner.request_id.or(header_request_id),
                    client_request_id: inner.client_request_id.or(header_client_request_id),
                    date: inner.date.or(header_date),
                    step_id: None,
                }
            }
            Err(_) => Self {
                status,
                code: None,
                message: String::from_utf8_lossy(body).into_owned(),
                request_id: header_request_id,
                client_request_id: header_client_request_id,
                date: header_date,
                step_id: None,
            },
        }
    }

    /// Attach the id of the batch step that produced this error.
    pub fn with_step_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

// Helper structures for parsing service error bodies

#[derive(Debug, serde::Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetails,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorDetails {
    code: Option<String>,
    message: Option<String>,
    #[serde(alias = "innererror")]
    inner_error: Option<InnerError>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct InnerError {
    #[serde(rename = "request-id")]
    request_id: Option<String>,
    #[serde(rename = "client-request-id")]
    client_request_id: Option<String>,
    date: Option<String>,
}

fn header_string(headers: &http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
