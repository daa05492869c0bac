//! HTTP middleware pipeline and request/response types
//!
//! This module provides the request pipeline of the SDK: the onion-style
//! [`Pipeline`](middleware::Pipeline) and the authentication, redirect, retry
//! and telemetry middleware that make up the default chain.

pub use auth::AuthenticationMiddleware;
pub use middleware::{
    FeatureFlags, Middleware, MiddlewareKind, Next, Pipeline, PipelineBuilder, RequestContext,
};
pub use redirect::{RedirectMiddleware, RedirectOptions};
pub use request::RequestInformation;
pub use response::Response;
pub use retry::{RetryMiddleware, RetryOptions};
pub use telemetry::TelemetryMiddleware;

mod auth;
pub mod middleware;
pub mod redirect;
mod request;
mod response;
pub mod retry;
pub mod telemetry;

// Re-export HTTP types from the http crate for convenience
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
