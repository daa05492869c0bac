//! Main client implementation for Microsoft Graph

use std::sync::Arc;
use std::time::Duration;

use graphkit_transport::{HttpRequest, HttpTransport, HttpTransportConfig, Transport};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    auth::{AccessTokenProvider, AllowedHosts, StaticTokenProvider},
    config::ClientConfig,
    error::{Error, Result},
    http::{
        AuthenticationMiddleware, FeatureFlags, Middleware, Pipeline, RedirectMiddleware,
        RedirectOptions, RequestContext, RequestInformation, Response, RetryMiddleware,
        RetryOptions, TelemetryMiddleware,
    },
    resources::Batches,
};

/// Main client for Microsoft Graph.
///
/// Every request goes through the same pipeline:
/// authentication → redirect → retry → custom middleware → telemetry → transport.
/// Clones share the pipeline and the pooled transport.
///
/// # Example
///
/// ```rust,no_run
/// use graphkit::GraphClient;
///
/// # fn example() -> graphkit::Result<()> {
/// let client = GraphClient::builder()
///     .access_token("eyJ0eXAi...")
///     .api_version("beta")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GraphClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Middleware chain and transport
    pipeline: Pipeline,

    /// Base URL including the API version, no trailing slash
    service_root: String,

    /// Headers added to every request that does not set them
    default_headers: HeaderMap,

    /// Features every request of this client reports
    features: FeatureFlags,
}

impl GraphClient {
    /// Create a new client builder for advanced configuration.
    pub fn builder() -> GraphClientBuilder {
        GraphClientBuilder::default()
    }

    /// Create a client from a configuration object.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a client that sends a static access token.
    pub fn with_access_token(token: impl Into<String>) -> Result<Self> {
        Self::builder().access_token(token).build()
    }

    /// Base URL including the API version, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn service_root(&self) -> &str {
        &self.inner.service_root
    }

    /// The middleware pipeline of this client.
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// A request descriptor for `path` relative to the service root.
    ///
    /// `path` may contain template expressions such as `{user_id}`.
    pub fn request_information(&self, method: Method, path: &str) -> RequestInformation {
        let path = path.trim_start_matches('/');
        RequestInformation::new(method, format!("{{+baseurl}}/{path}"))
            .path_parameter("baseurl", self.inner.service_root.clone())
    }

    /// Send a request.
    ///
    /// Error statuses are returned as responses; use [`Response::parse_result`]
    /// or [`send_json`](Self::send_json) to turn them into errors.
    pub async fn send(&self, info: RequestInformation) -> Result<Response> {
        self.send_with_cancellation(info, &CancellationToken::new())
            .await
    }

    /// Send a request, aborting when `cancellation` fires.
    pub async fn send_with_cancellation(
        &self,
        info: RequestInformation,
        cancellation: &CancellationToken,
    ) -> Result<Response> {
        self.send_request(info.into_http_request()?, cancellation, FeatureFlags::NONE)
            .await
    }

    /// Send a request and deserialize a success body.
    pub async fn send_json<T: DeserializeOwned>(&self, info: RequestInformation) -> Result<T> {
        self.send(info).await?.parse_result()
    }

    /// Access the `$batch` endpoint.
    pub fn batch(&self) -> Batches {
        Batches::new(self.clone())
    }

    pub(crate) async fn send_request(
        &self,
        mut request: HttpRequest,
        cancellation: &CancellationToken,
        features: FeatureFlags,
    ) -> Result<Response> {
        for (name, value) in &self.inner.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }

        let ctx = RequestContext::new(cancellation.clone())
            .with_features(self.inner.features | features);
        let response = self.inner.pipeline.send(request, &ctx).await?;
        Ok(response.into())
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("service_root", &self.inner.service_root)
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

/// Builder for [`GraphClient`].
#[derive(Default)]
pub struct GraphClientBuilder {
    config: ClientConfig,
    token_provider: Option<Arc<dyn AccessTokenProvider>>,
    transport: Option<Arc<dyn Transport>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl GraphClientBuilder {
    /// Merge `config` over the current settings.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = self.config.merge(config);
        self
    }

    /// Send a static bearer token to the service host.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(SecretString::new(token.into().into_boxed_str()));
        self
    }

    /// Use `provider` for tokens instead of a static token.
    pub fn token_provider(mut self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Set the service root.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set the API version.
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.config.api_version = Some(api_version.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the retry behaviour.
    pub fn retry_options(mut self, options: RetryOptions) -> Self {
        self.config.retry = options;
        self
    }

    /// Set the redirect behaviour.
    pub fn redirect_options(mut self, options: RedirectOptions) -> Self {
        self.config.redirect = options;
        self
    }

    /// Add a default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid according to HTTP specifications.
    pub fn default_header(mut self, key: &str, value: &str) -> Result<Self> {
        let key: HeaderName = key.parse()?;
        let value: HeaderValue = value.parse()?;
        self.config.default_headers.insert(key, value);
        Ok(self)
    }

    /// Use `transport` instead of the built-in reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Append a custom middleware; it runs after retry and before telemetry.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service root is not a valid URL
    /// - Two middleware share a kind
    /// - The default transport cannot be created
    pub fn build(self) -> Result<GraphClient> {
        let GraphClientBuilder {
            config,
            token_provider,
            transport,
            middleware: custom,
        } = self;

        let service_root = config.service_root();
        let root_url = Url::parse(&service_root)
            .map_err(|e| Error::InvalidUrl(format!("{service_root}: {e}")))?;

        let token_provider = match (token_provider, config.access_token.clone()) {
            (Some(provider), _) => Some(provider),
            (None, Some(token)) => {
                let hosts = AllowedHosts::new(root_url.host_str())?;
                let provider = StaticTokenProvider::from_secret(token).with_allowed_hosts(hosts);
                Some(Arc::new(provider) as Arc<dyn AccessTokenProvider>)
            }
            (None, None) => None,
        };

        let mut features = FeatureFlags::NONE;
        let transport = match transport {
            Some(transport) => transport,
            None => {
                features |= FeatureFlags::DEFAULT_HTTP_PROVIDER;
                let transport = HttpTransport::with_config(HttpTransportConfig {
                    timeout: config.timeout,
                    connect_timeout: config.connection_pool.connect_timeout,
                    pool_max_idle_per_host: config.connection_pool.max_idle_per_host,
                    pool_idle_timeout: config.connection_pool.idle_timeout,
                    user_agent: format!("graphkit/{}", crate::VERSION),
                })?;
                Arc::new(transport) as Arc<dyn Transport>
            }
        };

        let mut chain: Vec<Arc<dyn Middleware>> = Vec::with_capacity(custom.len() + 4);
        if let Some(provider) = token_provider {
            chain.push(Arc::new(AuthenticationMiddleware::new(provider)));
        }
        chain.push(Arc::new(RedirectMiddleware::new(config.redirect.clone())));
        chain.push(Arc::new(RetryMiddleware::new(config.retry.clone())));
        chain.extend(custom);
        chain.push(Arc::new(TelemetryMiddleware::new()));

        let pipeline = Pipeline::new(chain, transport)?;

        tracing::debug!(
            service_root = %service_root,
            middleware = ?pipeline.kinds(),
            "Graph client built"
        );

        Ok(GraphClient {
            inner: Arc::new(ClientInner {
                pipeline,
                service_root,
                default_headers: config.default_headers,
                features,
            }),
        })
    }
}
