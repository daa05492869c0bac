//! Authentication middleware

use super::middleware::{Middleware, MiddlewareKind, Next, RequestContext};
use crate::auth::AccessTokenProvider;
use crate::error::Result;
use async_trait::async_trait;
use graphkit_transport::{HttpRequest, HttpResponse};
use http::{HeaderValue, header};
use secrecy::ExposeSecret;
use std::sync::Arc;

/// Sets `Authorization: Bearer <token>` from an [`AccessTokenProvider`].
///
/// Requests to hosts outside the provider's allowed hosts, or for which the
/// provider issues no token, leave without any `Authorization` header.
/// A `401` is returned to the caller as-is; no re-authentication is attempted.
pub struct AuthenticationMiddleware {
    provider: Arc<dyn AccessTokenProvider>,
}

impl AuthenticationMiddleware {
    /// Create a new authentication middleware.
    pub fn new(provider: Arc<dyn AccessTokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Middleware for AuthenticationMiddleware {
    fn kind(&self) -> MiddlewareKind {
        MiddlewareKind::Authentication
    }

    async fn handle(
        &self,
        mut request: HttpRequest,
        ctx: &RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse> {
        let token = if self.provider.allowed_hosts().is_url_host_valid(&request.url) {
            self.provider.get_authorization_token(&request.url).await?
        } else {
            None
        };

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            request.headers.insert(header::AUTHORIZATION, value);
        } else {
            tracing::debug!(url = %request.url, "No token issued for host");
            request.headers.remove(header::AUTHORIZATION);
        }

        next.run(request, ctx).await
    }
}
