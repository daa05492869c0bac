//! # graphkit
//!
//! Core SDK for Microsoft Graph supporting:
//! - A composable HTTP middleware pipeline
//! - Authentication, redirect, retry and telemetry handlers
//! - JSON batching of up to 20 sub-requests per HTTP call
//! - Cancellation of in-flight sends and backoff waits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphkit::GraphClient;
//! use graphkit::batch::BatchRequestContent;
//! use graphkit::http::Method;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GraphClient::builder().access_token("eyJ0eXAi...").build()?;
//!
//!     let mut batch = BatchRequestContent::default();
//!     let me = batch.add_request_information(client.request_information(Method::GET, "/me"), None)?;
//!
//!     let responses = client.batch().post(&batch).await?;
//!     let user: serde_json::Value = responses.get_typed(&me)?;
//!     println!("{}", user["displayName"]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use auth::{AccessTokenProvider, AllowedHosts, StaticTokenProvider};
pub use client::{GraphClient, GraphClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result, ServiceError};
pub use crate::http::{RequestInformation, Response};

// Module declarations
pub mod auth;
pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod resources;

// Re-export the lower layers so callers need a single dependency
pub use graphkit_core::prelude::CancellationToken;
pub use graphkit_transport::{
    HttpRequest, HttpResponse, HttpTransport, HttpTransportConfig, RequestBody, Transport,
    TransportError,
};

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use graphkit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CancellationToken, ClientConfig, Error, GraphClient, HttpRequest, HttpResponse,
        RequestInformation, Response, Result, ServiceError,
        batch::{
            BatchRequestContent, BatchRequestContentCollection, BatchResponseContent,
            BatchResponseContentCollection, BatchStep,
        },
        http::middleware::{FeatureFlags, Middleware, MiddlewareKind, Next, Pipeline, RequestContext},
    };
}

/// SDK version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default service root
pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com";

/// Default API version path segment
pub const DEFAULT_API_VERSION: &str = "v1.0";
