//! Transport trait and the request/response types it carries
//!
//! Every stage of a middleware pipeline consumes an [`HttpRequest`] and
//! produces an [`HttpResponse`]; the [`Transport`] is the stage that actually
//! talks to the network.

use crate::body::RequestBody;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use url::Url;

/// An outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,

    /// Absolute request URL
    pub url: Url,

    /// Request headers
    pub headers: HeaderMap,

    /// Request body
    pub body: RequestBody,
}

impl HttpRequest {
    /// Create a new request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An HTTP response with its body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a new HTTP response
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A response with the given status, no headers and no body.
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), Bytes::new())
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response body as a string
    pub fn text(&self) -> std::result::Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Parse response body as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the response body cannot be parsed as valid JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Header value as a string, if present and valid UTF-8.
    ///
    /// Lookup is case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The terminal stage of a pipeline: sends a request over the wire.
///
/// Implementations are shared across all requests of a client; connection
/// pooling is their responsibility.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an HTTP request and receive a response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
