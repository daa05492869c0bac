//! Access token providers
//!
//! The authentication middleware asks an [`AccessTokenProvider`] for a token
//! for every outbound URL. Providers decide which hosts may receive a token.

use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashSet;
use url::Url;

/// Supplies bearer tokens for outbound requests.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a token for `url`.
    ///
    /// Returns `Ok(None)` when no token should be sent to this URL.
    async fn get_authorization_token(&self, url: &Url) -> Result<Option<SecretString>>;

    /// Hosts this provider issues tokens for.
    fn allowed_hosts(&self) -> &AllowedHosts;
}

/// Set of hosts a token may be sent to. An empty set allows every host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedHosts {
    hosts: HashSet<String>,
}

impl AllowedHosts {
    /// Create a set from host names. Comparison is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if an entry contains a scheme or path.
    pub fn new<I, S>(hosts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for host in hosts {
            let host = host.as_ref().trim();
            if host.contains("://") || host.contains('/') {
                return Err(Error::InvalidArgument(format!(
                    "allowed host '{host}' must be a bare host name"
                )));
            }
            if !host.is_empty() {
                set.insert(host.to_ascii_lowercase());
            }
        }
        Ok(Self { hosts: set })
    }

    /// Whether `url` points at an allowed host.
    pub fn is_url_host_valid(&self, url: &Url) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        url.host_str()
            .is_some_and(|host| self.hosts.contains(&host.to_ascii_lowercase()))
    }

    /// Whether no restriction is configured.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Check that a token may be sent to `url` over its scheme.
///
/// Tokens travel over `https` only; plain `http` is accepted for loopback
/// hosts so local test servers work.
pub fn validate_scheme(url: &Url) -> Result<()> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")) => Ok(()),
        scheme => Err(Error::Authentication(format!(
            "refusing to send a token over '{scheme}' to {}",
            url.host_str().unwrap_or_default()
        ))),
    }
}

/// A provider that hands out one fixed token.
///
/// # Examples
///
/// ```rust
/// use graphkit::{AllowedHosts, StaticTokenProvider};
///
/// let provider = StaticTokenProvider::new("eyJ0eXAi...")
///     .with_allowed_hosts(AllowedHosts::new(["graph.microsoft.com"]).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: SecretString,
    allowed_hosts: AllowedHosts,
}

impl StaticTokenProvider {
    /// Create a provider for `token`, valid for every host.
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_secret(SecretString::new(token.into().into_boxed_str()))
    }

    /// Create a provider from an already wrapped secret.
    pub fn from_secret(token: SecretString) -> Self {
        Self {
            token,
            allowed_hosts: AllowedHosts::default(),
        }
    }

    /// Restrict the hosts the token is sent to.
    pub fn with_allowed_hosts(mut self, allowed_hosts: AllowedHosts) -> Self {
        self.allowed_hosts = allowed_hosts;
        self
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn get_authorization_token(&self, url: &Url) -> Result<Option<SecretString>> {
        if !self.allowed_hosts.is_url_host_valid(url) {
            return Ok(None);
        }
        validate_scheme(url)?;
        Ok(Some(self.token.clone()))
    }

    fn allowed_hosts(&self) -> &AllowedHosts {
        &self.allowed_hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use secrecy::ExposeSecret;

    #[rstest]
    #[case("https://graph.microsoft.com/v1.0/me", true)]
    #[case("https://GRAPH.microsoft.com/v1.0/me", true)]
    #[case("https://evil.example.com/v1.0/me", false)]
    fn test_allowed_hosts(#[case] url: &str, #[case] expected: bool) {
        let hosts = AllowedHosts::new(["graph.microsoft.com"]).unwrap();
        assert_eq!(hosts.is_url_host_valid(&url.parse().unwrap()), expected);
    }

    #[test]
    fn test_allowed_hosts_rejects_urls() {
        assert!(AllowedHosts::new(["https://graph.microsoft.com"]).is_err());
    }

    #[rstest]
    #[case("https://graph.microsoft.com/", true)]
    #[case("http://localhost:8080/", true)]
    #[case("http://127.0.0.1:3000/", true)]
    #[case("http://graph.microsoft.com/", false)]
    fn test_validate_scheme(#[case] url: &str, #[case] ok: bool) {
        assert_eq!(validate_scheme(&url.parse().unwrap()).is_ok(), ok);
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("token-123")
            .with_allowed_hosts(AllowedHosts::new(["graph.microsoft.com"]).unwrap());

        let token = provider
            .get_authorization_token(&"https://graph.microsoft.com/v1.0/me".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.expose_secret(), "token-123");

        let none = provider
            .get_authorization_token(&"https://other.example.com/".parse().unwrap())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_static_provider_refuses_plain_http() {
        let provider = StaticTokenProvider::new("token-123");
        let result = provider
            .get_authorization_token(&"http://graph.microsoft.com/v1.0/me".parse().unwrap())
            .await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
