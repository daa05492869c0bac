//! HTTP response wrapper

use crate::error::{Result, ServiceError};
use bytes::Bytes;
use graphkit_transport::HttpResponse;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// A response from the service, or one step of a batch response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON regardless of status.
    ///
    /// An empty body deserializes as `null`, so `Option<T>` and `()` accept
    /// `204 No Content`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The service error carried by this response, if it is not a success.
    pub fn error(&self) -> Option<ServiceError> {
        (!self.is_success())
            .then(|| ServiceError::from_response(self.status.as_u16(), &self.body, &self.headers))
    }

    /// Deserialize a success body, or turn an error status into [`crate::Error::Service`].
    pub fn parse_result<T: DeserializeOwned>(&self) -> Result<T> {
        match self.error() {
            Some(err) => Err(err.into()),
            None => self.json(),
        }
    }
}

impl From<HttpResponse> for Response {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_result_success() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), r#"{"id":"42"}"#);
        let value: serde_json::Value = response.parse_result().unwrap();
        assert_eq!(value["id"], "42");
    }

    #[test]
    fn test_parse_result_error() {
        let response = Response::new(
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            r#"{"error":{"code":"itemNotFound","message":"The resource could not be found."}}"#,
        );

        match response.parse_result::<serde_json::Value>() {
            Err(Error::Service(err)) => {
                assert_eq!(err.status, 404);
                assert_eq!(err.code.as_deref(), Some("itemNotFound"));
            }
            other => panic!("Expected Service error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_content() {
        let response = Response::new(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new());
        let value: Option<serde_json::Value> = response.parse_result().unwrap();
        assert!(value.is_none());
    }
}
