//! Configuration for the Graph client

use crate::http::{RedirectOptions, RetryOptions};
use http::HeaderMap;
use secrecy::SecretString;
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Configuration for the Graph client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Static bearer token, used when no token provider is injected
    pub access_token: Option<SecretString>,

    /// Service root, e.g. `https://graph.microsoft.com`
    pub base_url: Option<String>,

    /// API version path segment, e.g. `v1.0` or `beta`
    pub api_version: Option<String>,

    /// Default timeout for requests
    pub timeout: Duration,

    /// Retry behaviour for throttled responses
    pub retry: RetryOptions,

    /// Redirect behaviour
    pub redirect: RedirectOptions,

    /// Custom headers to include with every request
    pub default_headers: HeaderMap,

    /// Connection pool configuration
    pub connection_pool: ConnectionPoolConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: None,
            api_version: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryOptions::default(),
            redirect: RedirectOptions::default(),
            default_headers: HeaderMap::new(),
            connection_pool: ConnectionPoolConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with a static access token.
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(SecretString::new(token.into().into_boxed_str())),
            ..Default::default()
        }
    }

    /// Service root with the API version appended, without a trailing slash.
    pub fn service_root(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(crate::DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let version = self
            .api_version
            .as_deref()
            .unwrap_or(crate::DEFAULT_API_VERSION)
            .trim_matches('/');
        format!("{base}/{version}")
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first. This will look for:
    /// - `GRAPH_ACCESS_TOKEN` for a static bearer token
    /// - `GRAPH_BASE_URL` for the service root
    /// - `GRAPH_API_VERSION` for the API version
    /// - `GRAPH_TIMEOUT` for request timeout (in seconds)
    /// - `GRAPH_MAX_RETRIES` for maximum retry attempts
    /// - `GRAPH_RETRY_DELAY_MS` for the base backoff delay (in milliseconds)
    /// - `GRAPH_MAX_REDIRECTS` for maximum redirects followed
    ///
    /// # Errors
    ///
    /// Returns an error if `GRAPH_MAX_REDIRECTS` exceeds the allowed maximum.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self, crate::error::Error> {
        use std::env;

        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(token) = env::var("GRAPH_ACCESS_TOKEN") {
            config.access_token = Some(SecretString::new(token.into_boxed_str()));
        }

        if let Ok(base_url) = env::var("GRAPH_BASE_URL") {
            config.base_url = Some(base_url);
        }

        if let Ok(api_version) = env::var("GRAPH_API_VERSION") {
            config.api_version = Some(api_version);
        }

        if let Ok(timeout_str) = env::var("GRAPH_TIMEOUT")
            && let Ok(timeout_secs) = timeout_str.parse::<u64>()
        {
            config.timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(max_retries_str) = env::var("GRAPH_MAX_RETRIES")
            && let Ok(max_retries) = max_retries_str.parse::<u32>()
        {
            config.retry.set_max_retries(max_retries);
        }

        if let Ok(delay_str) = env::var("GRAPH_RETRY_DELAY_MS")
            && let Ok(delay_ms) = delay_str.parse::<u64>()
        {
            config.retry.set_delay(Duration::from_millis(delay_ms));
        }

        if let Ok(max_redirects_str) = env::var("GRAPH_MAX_REDIRECTS")
            && let Ok(max_redirects) = max_redirects_str.parse::<u32>()
        {
            config.redirect = RedirectOptions::new(max_redirects)?;
        }

        Ok(config)
    }

    /// Merge this configuration with another, with the other taking precedence.
    ///
    /// Fields of `other` still at their default value do not override. Retry and
    /// redirect options carrying a predicate always override.
    pub fn merge(mut self, other: ClientConfig) -> Self {
        let defaults = ClientConfig::default();

        if other.access_token.is_some() {
            self.access_token = other.access_token;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.api_version.is_some() {
            self.api_version = other.api_version;
        }
        if other.timeout != defaults.timeout {
            self.timeout = other.timeout;
        }
        if !other.retry.is_default() {
            self.retry = other.retry;
        }
        if !other.redirect.is_default() {
            self.redirect = other.redirect;
        }
        for (key, value) in other.default_headers.iter() {
            self.default_headers.insert(key.clone(), value.clone());
        }

        self
    }
}

/// Configuration for HTTP connection pooling.
#[derive(Debug, Clone)]
pub struct ConnectionPoolConfig {
    /// Maximum number of idle connections per host
    pub max_idle_per_host: usize,

    /// Idle connection timeout
    pub idle_timeout: Duration,

    /// Connection establishment timeout
    pub connect_timeout: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
