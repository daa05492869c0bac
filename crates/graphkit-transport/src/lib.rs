//! Wire-level transport layer for graphkit
//!
//! Provides the request/response types every pipeline stage works with and
//! the terminal handler that performs the actual network call.
//!
//! # Architecture
//!
//! - **Transport trait**: the innermost stage of a middleware pipeline
//! - **HTTP transport**: one shared, pooled reqwest client
//! - **Request bodies**: buffered (replayable) or streaming (forward-only)
//! - **Error handling**: [`TransportError`] separates timeouts from other failures
//!
//! # Usage
//!
//! ```ignore
//! use graphkit_transport::{HttpRequest, HttpTransport, Transport};
//! use http::Method;
//!
//! let transport = HttpTransport::new()?;
//! let request = HttpRequest::new(Method::GET, "https://graph.microsoft.com/v1.0/me".parse()?);
//! let response = transport.send(request).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod body;
pub mod error;
pub mod http_transport;
pub mod traits;

pub use body::{BodyStream, RequestBody};
pub use error::{Result, TransportError};
pub use http_transport::{HttpTransport, HttpTransportConfig};
pub use traits::{HttpRequest, HttpResponse, Transport};
