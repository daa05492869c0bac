//! Telemetry middleware
//!
//! Reports the SDK version and the features in use through the `SdkVersion`
//! header, tags each request with a `client-request-id` and logs every hop.

use super::middleware::{Middleware, MiddlewareKind, Next, RequestContext};
use crate::error::Result;
use crate::observability::{RequestMetadata, RequestTimer, ResponseMetadata};
use async_trait::async_trait;
use graphkit_transport::{HttpRequest, HttpResponse};
use http::{HeaderName, HeaderValue};

/// `SdkVersion` header name.
pub const SDK_VERSION: HeaderName = HeaderName::from_static("sdkversion");

/// `client-request-id` header name.
pub const CLIENT_REQUEST_ID: HeaderName = HeaderName::from_static("client-request-id");

/// Adds SDK headers and logs requests and responses.
///
/// Sits last in the chain so it sees every redirect hop and every retry.
#[derive(Debug, Clone, Default)]
pub struct TelemetryMiddleware;

impl TelemetryMiddleware {
    /// Create a new telemetry middleware.
    pub fn new() -> Self {
        Self
    }
}

/// `SdkVersion` value for the given feature flags.
pub fn sdk_version_value(ctx: &RequestContext) -> String {
    format!(
        "graphkit-rust/{} (featureUsage={})",
        crate::VERSION,
        ctx.features.to_hex()
    )
}

#[async_trait]
impl Middleware for TelemetryMiddleware {
    fn kind(&self) -> MiddlewareKind {
        MiddlewareKind::Telemetry
    }

    async fn handle(
        &self,
        mut request: HttpRequest,
        ctx: &RequestContext,
        next: Next<'_>,
    ) -> Result<HttpResponse> {
        let ours = sdk_version_value(ctx);
        let sdk_version = match request.header(SDK_VERSION.as_str()) {
            Some(existing) if !existing.contains("graphkit-rust/") => format!("{ours}, {existing}"),
            Some(existing) => existing.to_string(),
            None => ours,
        };
        request
            .headers
            .insert(SDK_VERSION, HeaderValue::from_str(&sdk_version)?);

        if !request.headers.contains_key(CLIENT_REQUEST_ID) {
            let id = uuid::Uuid::new_v4().to_string();
            request
                .headers
                .insert(CLIENT_REQUEST_ID, HeaderValue::from_str(&id)?);
        }

        let mut metadata = RequestMetadata::new(request.method.as_str(), request.url.as_str());
        if let Some(length) = request.body.content_length() {
            metadata = metadata.with_body_size(length as usize);
        }
        if let Some(attempt) = request
            .header(super::retry::RETRY_ATTEMPT.as_str())
            .and_then(|v| v.parse().ok())
        {
            metadata = metadata.with_attempt(attempt);
        }
        if let Some(id) = request.header(CLIENT_REQUEST_ID.as_str()) {
            metadata = metadata.with_client_request_id(id);
        }
        metadata.log_request();

        let timer = RequestTimer::start();
        let result = next.run(request, ctx).await;

        match &result {
            Ok(response) => {
                let response_metadata =
                    ResponseMetadata::new(response.status.as_u16(), timer.elapsed())
                        .with_body_size(response.body.len());
                if response.is_success() {
                    response_metadata.log_success(&metadata);
                } else {
                    response_metadata.log_error(&metadata, "non-success status");
                }
            }
            Err(err) => metadata.log_failure(&err.to_string(), timer.elapsed()),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{FeatureFlags, Pipeline};
    use graphkit_transport::{Transport, TransportError};
    use http::{Method, StatusCode};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Capture {
        async fn send(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse::with_status(StatusCode::OK))
        }
    }

    #[tokio::test]
    async fn test_headers_added() {
        let transport = Arc::new(Capture::default());
        let pipeline = Pipeline::builder()
            .with(TelemetryMiddleware::new())
            .transport(transport.clone())
            .build()
            .unwrap();

        let ctx = RequestContext::default()
            .with_features(FeatureFlags::RETRY_HANDLER | FeatureFlags::BATCH_REQUEST);
        let request = HttpRequest::new(Method::GET, "https://graph.microsoft.com/v1.0/me".parse().unwrap());
        pipeline.send(request, &ctx).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].header("sdkversion").unwrap(),
            format!("graphkit-rust/{} (featureUsage=202)", crate::VERSION)
        );
        let id = seen[0].header("client-request-id").unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_existing_client_request_id_kept() {
        let transport = Arc::new(Capture::default());
        let pipeline = Pipeline::builder()
            .with(TelemetryMiddleware::new())
            .transport(transport.clone())
            .build()
            .unwrap();

        let request = HttpRequest::new(Method::GET, "https://graph.microsoft.com/v1.0/me".parse().unwrap())
            .with_header(CLIENT_REQUEST_ID, HeaderValue::from_static("my-id"));
        pipeline.send(request, &RequestContext::default()).await.unwrap();

        assert_eq!(
            transport.seen.lock().unwrap()[0].header("client-request-id"),
            Some("my-id")
        );
    }
}
