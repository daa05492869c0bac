//! HTTP middleware for request/response processing
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`] in front of a
//! [`Transport`]. Each middleware receives the request together with a
//! [`Next`] handle for the rest of the chain, so the list runs in order on the
//! way out and in reverse order on the way back:
//!
//! ```text
//! A → B → C → transport → C → B → A
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use graphkit_transport::{HttpRequest, HttpResponse, Transport};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Identifies what a middleware does.
///
/// A pipeline holds at most one middleware of each kind. Built-in kinds also
/// map to a [`FeatureFlags`] bit reported by the telemetry middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareKind {
    /// Sets the `Authorization` header
    Authentication,
    /// Follows 3xx responses
    Redirect,
    /// Retries throttled responses
    Retry,
    /// Adds SDK headers and logs requests
    Telemetry,
    /// Any other middleware, identified by name
    Custom(&'static str),
}

impl MiddlewareKind {
    /// Telemetry bit for this kind.
    pub fn feature_flag(self) -> FeatureFlags {
        match self {
            MiddlewareKind::Redirect => FeatureFlags::REDIRECT_HANDLER,
            MiddlewareKind::Retry => FeatureFlags::RETRY_HANDLER,
            MiddlewareKind::Authentication => FeatureFlags::AUTH_HANDLER,
            MiddlewareKind::Telemetry | MiddlewareKind::Custom(_) => FeatureFlags::NONE,
        }
    }
}

impl fmt::Display for MiddlewareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareKind::Authentication => f.write_str("authentication"),
            MiddlewareKind::Redirect => f.write_str("redirect"),
            MiddlewareKind::Retry => f.write_str("retry"),
            MiddlewareKind::Telemetry => f.write_str("telemetry"),
            MiddlewareKind::Custom(name) => f.write_str(name),
        }
    }
}

/// Bitset of SDK features used by a request, reported in the `SdkVersion` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FeatureFlags(u32);

impl FeatureFlags {
    /// No features
    pub const NONE: Self = Self(0x0);
    /// Redirect middleware present
    pub const REDIRECT_HANDLER: Self = Self(0x1);
    /// Retry middleware present
    pub const RETRY_HANDLER: Self = Self(0x2);
    /// Authentication middleware present
    pub const AUTH_HANDLER: Self = Self(0x4);
    /// The client built its own HTTP transport
    pub const DEFAULT_HTTP_PROVIDER: Self = Self(0x8);
    /// Request logging enabled
    pub const LOGGING_HANDLER: Self = Self(0x10);
    /// Request is a JSON batch
    pub const BATCH_REQUEST: Self = Self(0x200);

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Lowercase hex without prefix, as sent in `featureUsage=`.
    pub fn to_hex(self) -> String {
        format!("{:x}", self.0)
    }
}

impl BitOr for FeatureFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FeatureFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Per-send state shared by every middleware of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Cancels the send, including any backoff wait in progress
    pub cancellation: CancellationToken,
    /// Features used by this request
    pub features: FeatureFlags,
}

impl RequestContext {
    /// Create a context observing `cancellation`.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            features: FeatureFlags::NONE,
        }
    }

    /// Add feature bits to the context.
    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features |= features;
        self
    }
}

/// Trait for HTTP middleware.
///
/// Implementations may inspect or rewrite the request, call `next.run` zero
/// or more times, and inspect or replace the response.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// What this middleware does.
    fn kind(&self) -> MiddlewareKind;

    /// Process a request, forwarding it to the rest of the chain through `next`.
    async fn handle(
        &self,
        request: HttpRequest,
        ctx: &RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse>;
}

/// Handle to the remainder of a pipeline.
///
/// `Next` is `Copy`: middleware that re-sends (redirect, retry) calls
/// [`Next::run`] once per attempt.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Build a handle over `middleware` followed by `transport`.
    pub fn new(middleware: &'a [Arc<dyn Middleware>], transport: &'a dyn Transport) -> Self {
        Self {
            middleware,
            transport,
        }
    }

    /// Send `request` through the remaining middleware and the transport.
    pub async fn run(self, request: HttpRequest, ctx: &RequestContext) -> Result<HttpResponse> {
        if let Some((current, rest)) = self.middleware.split_first() {
            let next = Next {
                middleware: rest,
                transport: self.transport,
            };
            return current.handle(request, ctx, next).await;
        }

        if ctx.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(Error::Cancelled),
            result = self.transport.send(request) => Ok(result?),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.middleware.len())
            .finish()
    }
}

/// An ordered middleware chain in front of a transport.
///
/// Cheap to clone; clones share the middleware and the transport.
#[derive(Clone)]
pub struct Pipeline {
    middleware: Arc<[Arc<dyn Middleware>]>,
    transport: Arc<dyn Transport>,
    features: FeatureFlags,
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Compose `middleware` (outermost first) in front of `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateMiddleware`] if two entries share a kind.
    pub fn new(
        middleware: Vec<Arc<dyn Middleware>>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let mut features = FeatureFlags::NONE;
        let mut seen = Vec::with_capacity(middleware.len());

        for entry in &middleware {
            let kind = entry.kind();
            if seen.contains(&kind) {
                return Err(Error::DuplicateMiddleware(kind));
            }
            seen.push(kind);
            features |= kind.feature_flag();
        }

        Ok(Self {
            middleware: middleware.into(),
            transport,
            features,
        })
    }

    /// Kinds of the middleware in order.
    pub fn kinds(&self) -> Vec<MiddlewareKind> {
        self.middleware.iter().map(|m| m.kind()).collect()
    }

    /// Features contributed by the middleware of this pipeline.
    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    /// Send a request through the whole chain.
    pub async fn send(&self, request: HttpRequest, ctx: &RequestContext) -> Result<HttpResponse> {
        let ctx = ctx.clone().with_features(self.features);
        Next::new(&self.middleware, self.transport.as_ref())
            .run(request, &ctx)
            .await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.kinds())
            .field("features", &self.features)
            .finish()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
    transport: Option<Arc<dyn Transport>>,
}

impl PipelineBuilder {
    /// Append a middleware; it runs after the ones added before it.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append a shared middleware.
    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Set the terminal transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfig`] without a transport and
    /// [`Error::DuplicateMiddleware`] when a kind repeats.
    pub fn build(self) -> Result<Pipeline> {
        let transport = self
            .transport
            .ok_or_else(|| Error::MissingConfig("pipeline transport".to_string()))?;
        Pipeline::new(self.middleware, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphkit_transport::TransportError;
    use http::{Method, StatusCode};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        fn kind(&self) -> MiddlewareKind {
            MiddlewareKind::Custom(self.name)
        }

        async fn handle(
            &self,
            request: HttpRequest,
            ctx: &RequestContext,
            next: Next<'_>,
        ) -> Result<HttpResponse> {
            self.log.lock().unwrap().push(format!("{}>", self.name));
            let response = next.run(request, ctx).await;
            self.log.lock().unwrap().push(format!("<{}", self.name));
            response
        }
    }

    struct StubTransport {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.log.lock().unwrap().push("transport".to_string());
            Ok(HttpResponse::with_status(StatusCode::OK))
        }
    }

    fn request() -> HttpRequest {
        HttpRequest::new(
            Method::GET,
            "https://graph.microsoft.com/v1.0/me".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .with(Recorder { name: "A", log: log.clone() })
            .with(Recorder { name: "B", log: log.clone() })
            .with(Recorder { name: "C", log: log.clone() })
            .transport(Arc::new(StubTransport { log: log.clone() }))
            .build()
            .unwrap();

        let response = pipeline
            .send(request(), &RequestContext::default())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A>", "B>", "C>", "transport", "<C", "<B", "<A"]
        );
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = Pipeline::builder()
            .with(Recorder { name: "A", log: log.clone() })
            .with(Recorder { name: "A", log: log.clone() })
            .transport(Arc::new(StubTransport { log }))
            .build();

        match result {
            Err(Error::DuplicateMiddleware(kind)) => assert_eq!(kind, MiddlewareKind::Custom("A")),
            other => panic!("Expected DuplicateMiddleware, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_transport() {
        let result = Pipeline::builder().build();
        assert!(matches!(result, Err(Error::MissingConfig(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_transport() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .transport(Arc::new(StubTransport { log: log.clone() }))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let result = pipeline.send(request(), &RequestContext::new(token)).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_feature_flags() {
        let mut flags = FeatureFlags::REDIRECT_HANDLER | FeatureFlags::RETRY_HANDLER;
        flags.insert(FeatureFlags::AUTH_HANDLER);
        flags |= FeatureFlags::BATCH_REQUEST;

        assert!(flags.contains(FeatureFlags::RETRY_HANDLER));
        assert!(!flags.contains(FeatureFlags::LOGGING_HANDLER));
        assert_eq!(flags.bits(), 0x207);
        assert_eq!(flags.to_hex(), "207");
    }
}
