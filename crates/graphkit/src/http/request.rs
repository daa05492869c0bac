//! URL-template request descriptor

use crate::error::{Error, Result};
use bytes::Bytes;
use graphkit_transport::{HttpRequest, RequestBody};
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Describes a request before it is turned into an [`HttpRequest`].
///
/// The URL comes from a template such as `{+baseurl}/users/{user_id}/messages{?%24top}`:
/// - `{+name}` inserts the path parameter verbatim
/// - `{name}` inserts the path parameter percent-encoded
/// - `{?a,b}` appends the named query parameters that are set
///
/// Query parameters not named by the template are appended as well.
#[derive(Debug, Clone)]
pub struct RequestInformation {
    /// HTTP method
    pub method: Method,
    /// URL template
    pub url_template: String,
    /// Values for path expressions
    pub path_parameters: BTreeMap<String, String>,
    /// Values for query parameters
    pub query_parameters: BTreeMap<String, String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub content: RequestBody,
    url: Option<Url>,
}

impl RequestInformation {
    /// Create a descriptor for `method` and `url_template`.
    pub fn new(method: Method, url_template: impl Into<String>) -> Self {
        Self {
            method,
            url_template: url_template.into(),
            path_parameters: BTreeMap::new(),
            query_parameters: BTreeMap::new(),
            headers: HeaderMap::new(),
            content: RequestBody::Empty,
            url: None,
        }
    }

    /// Create a descriptor for an already resolved URL; the template is ignored.
    pub fn with_url(method: Method, url: Url) -> Self {
        let mut info = Self::new(method, url.as_str());
        info.url = Some(url);
        info
    }

    /// Set a path parameter.
    pub fn path_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters.insert(name.into(), value.into());
        self
    }

    /// Set a query parameter.
    pub fn query_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.insert(name.into(), value.into());
        self
    }

    /// Set a header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value contains invalid characters.
    pub fn try_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name: HeaderName = name.parse()?;
        let value: HeaderValue = value.parse()?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Serialize `value` as the JSON body and set `Content-Type: application/json`.
    pub fn set_json_content<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set_content(bytes, HeaderValue::from_static("application/json"));
        Ok(())
    }

    /// Use `bytes` as the body with the given content type.
    pub fn set_content(&mut self, bytes: impl Into<Bytes>, content_type: HeaderValue) {
        self.headers.insert(header::CONTENT_TYPE, content_type);
        self.content = RequestBody::Buffered(bytes.into());
    }

    /// Use a one-shot stream as the body with `Content-Type: application/octet-stream`.
    ///
    /// Stream bodies have no known length, so they are never retried.
    pub fn set_stream_content(&mut self, body: RequestBody) {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        self.content = body;
    }

    /// Expand the template into an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unterminated expression and
    /// [`Error::InvalidUrl`] if the expansion is not an absolute URL.
    pub fn url(&self) -> Result<Url> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let mut expanded = String::with_capacity(self.url_template.len());
        let mut used_query = Vec::new();
        let mut has_query = false;
        let mut rest = self.url_template.as_str();

        while let Some(open) = rest.find('{') {
            expanded.push_str(&rest[..open]);
            let close = rest[open..].find('}').ok_or_else(|| {
                Error::InvalidArgument(format!("unterminated expression in '{}'", self.url_template))
            })? + open;
            let expression = &rest[open + 1..close];

            if let Some(raw) = expression.strip_prefix('+') {
                if let Some(value) = self.path_parameters.get(raw) {
                    expanded.push_str(value);
                }
            } else if let Some(names) = expression.strip_prefix('?') {
                for name in names.split(',') {
                    used_query.push(name);
                    if let Some(value) = self.query_parameters.get(name) {
                        push_query(&mut expanded, &mut has_query, name, value);
                    }
                }
            } else if let Some(value) = self.path_parameters.get(expression) {
                expanded.push_str(&urlencoding::encode(value));
            }

            rest = &rest[close + 1..];
        }
        expanded.push_str(rest);

        if expanded.contains('?') {
            has_query = true;
        }
        for (name, value) in &self.query_parameters {
            if !used_query.contains(&name.as_str()) {
                push_query(&mut expanded, &mut has_query, name, value);
            }
        }

        Url::parse(&expanded).map_err(|e| Error::InvalidUrl(format!("{expanded}: {e}")))
    }

    /// Turn the descriptor into a wire-level request.
    pub fn into_http_request(self) -> Result<HttpRequest> {
        let url = self.url()?;
        Ok(HttpRequest {
            method: self.method,
            url,
            headers: self.headers,
            body: self.content,
        })
    }
}

fn push_query(url: &mut String, has_query: &mut bool, name: &str, value: &str) {
    url.push(if *has_query { '&' } else { '?' });
    *has_query = true;
    url.push_str(name);
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}
