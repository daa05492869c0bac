//! HTTP transport client implementation
//!
//! Implements the [`Transport`] trait on top of a single shared reqwest client.
//! Retries and redirects are not handled here: reqwest's own
//! redirect following is turned off so that the redirect middleware sees every
//! 3xx response.

use crate::error::{Result, TransportError};
use crate::traits::{HttpRequest, HttpResponse, Transport};
use crate::body::RequestBody;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use std::sync::Arc;
use std::time::Duration;

/// HTTP transport implementation
///
/// Handles:
/// - Connection pooling (one client shared by every request)
/// - Timeout handling
/// - Buffered and streaming request bodies
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Arc<ReqwestClient>,
}

impl HttpTransport {
    /// Create a new HTTP transport with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpTransportConfig::default())
    }

    /// Create a new HTTP transport with custom configuration
    pub fn with_config(config: HttpTransportConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self::from_client(client))
    }

    /// Wrap an existing reqwest client.
    ///
    /// The client should have redirect following disabled, otherwise the
    /// redirect middleware never sees 3xx responses.
    pub fn from_client(client: ReqwestClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying reqwest client
    pub fn reqwest_client(&self) -> Arc<ReqwestClient> {
        self.client.clone()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        tracing::trace!(method = %method, url = %url, "Dispatching request");

        let mut req = self.client.request(method, url).headers(headers);

        match body {
            RequestBody::Empty => {}
            RequestBody::Buffered(bytes) => {
                req = req.body(bytes);
            }
            streaming @ RequestBody::Streaming(_) => {
                let stream = streaming
                    .take_stream()
                    .ok_or(TransportError::BodyConsumed)?;
                req = req.body(reqwest::Body::wrap_stream(stream));
            }
        }

        let response = req.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// HTTP transport configuration
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,

    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(100),
            connect_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("graphkit-transport/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new().expect("Failed to create transport");
        let _client = transport.reqwest_client();
    }

    #[test]
    fn test_http_transport_with_config() {
        let config = HttpTransportConfig {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 5,
            ..Default::default()
        };

        assert!(HttpTransport::with_config(config).is_ok());
    }

    #[test]
    fn test_clones_share_client() {
        let transport = HttpTransport::new().unwrap();
        let clone = transport.clone();
        assert!(Arc::ptr_eq(&transport.client, &clone.client));
    }
}
