//! Redirect middleware
//!
//! The transport never follows redirects itself; this middleware re-sends
//! 3xx responses through the rest of the chain so retry and telemetry see
//! every hop.

use super::middleware::{Middleware, MiddlewareKind, Next, RequestContext};
use crate::error::{Error, Result};
use async_trait::async_trait;
use graphkit_transport::{HttpRequest, HttpResponse, RequestBody};
use http::{Method, StatusCode, header};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Default number of redirects followed per request.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Upper bound for [`RedirectOptions::max_redirects`].
pub const MAX_MAX_REDIRECTS: u32 = 20;

/// Decides whether a redirect response is followed.
pub type ShouldRedirect = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>;

/// Redirect behaviour.
#[derive(Clone)]
pub struct RedirectOptions {
    max_redirects: u32,
    should_redirect: Option<ShouldRedirect>,
}

impl RedirectOptions {
    /// Options following up to `max_redirects` hops.
    ///
    /// `0` disables following; the redirect response is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] above [`MAX_MAX_REDIRECTS`].
    pub fn new(max_redirects: u32) -> Result<Self> {
        if max_redirects > MAX_MAX_REDIRECTS {
            return Err(Error::InvalidArgument(format!(
                "max_redirects must be at most {MAX_MAX_REDIRECTS}, got {max_redirects}"
            )));
        }
        Ok(Self {
            max_redirects,
            should_redirect: None,
        })
    }

    /// Only follow redirects for which `predicate` returns true.
    pub fn with_should_redirect<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HttpResponse) -> bool + Send + Sync + 'static,
    {
        self.should_redirect = Some(Arc::new(predicate));
        self
    }

    /// Maximum number of hops.
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Whether a `should_redirect` predicate is set.
    pub fn has_should_redirect(&self) -> bool {
        self.should_redirect.is_some()
    }

    pub(crate) fn is_default(&self) -> bool {
        self.max_redirects == DEFAULT_MAX_REDIRECTS && self.should_redirect.is_none()
    }

    fn allows(&self, response: &HttpResponse) -> bool {
        self.should_redirect
            .as_ref()
            .is_none_or(|predicate| predicate(response))
    }
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            should_redirect: None,
        }
    }
}

impl fmt::Debug for RedirectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectOptions")
            .field("max_redirects", &self.max_redirects)
            .field("should_redirect", &self.should_redirect.is_some())
            .finish()
    }
}

/// Follows 301, 302, 303, 307 and 308 responses.
#[derive(Debug, Clone, Default)]
pub struct RedirectMiddleware {
    options: RedirectOptions,
}

impl RedirectMiddleware {
    /// Create a redirect middleware with the given options.
    pub fn new(options: RedirectOptions) -> Self {
        Self { options }
    }
}

/// Whether `status` is a redirect this middleware follows.
pub fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

#[async_trait]
impl Middleware for RedirectMiddleware {
    fn kind(&self) -> MiddlewareKind {
        MiddlewareKind::Redirect
    }

    async fn handle(
        &self,
        request: HttpRequest,
        ctx: &RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse> {
        let mut current = request.clone();
        let mut response = next.run(request, ctx).await?;
        let mut redirects = 0;

        while is_redirect(response.status)
            && self.options.max_redirects > 0
            && self.options.allows(&response)
        {
            if redirects >= self.options.max_redirects {
                tracing::warn!(
                    url = %current.url,
                    redirects,
                    "Redirect limit reached"
                );
                return Err(Error::TooManyRedirects { count: redirects });
            }

            current = redirect_request(current, &response)?;
            redirects += 1;

            tracing::debug!(
                status = response.status.as_u16(),
                url = %current.url,
                redirect = redirects,
                "Following redirect"
            );

            response = next.run(current.clone(), ctx).await?;
        }

        Ok(response)
    }
}

/// Build the follow-up request for a redirect `response` to `previous`.
fn redirect_request(mut previous: HttpRequest, response: &HttpResponse) -> Result<HttpRequest> {
    let location = response
        .header(header::LOCATION.as_str())
        .ok_or(Error::MissingLocationHeader {
            status: response.status.as_u16(),
        })?;

    let target = previous
        .url
        .join(location)
        .map_err(|e| Error::InvalidRedirectLocation(format!("{location}: {e}")))?;

    if response.status == StatusCode::SEE_OTHER {
        previous.method = Method::GET;
        previous.body = RequestBody::Empty;
        previous.headers.remove(header::CONTENT_TYPE);
        previous.headers.remove(header::CONTENT_LENGTH);
    } else if !previous.body.is_replayable() {
        return Err(Error::RedirectBodyNotReplayable);
    }

    if !same_origin(&previous.url, &target) {
        previous.headers.remove(header::AUTHORIZATION);
    }

    previous.url = target;
    Ok(previous)
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str()
}
