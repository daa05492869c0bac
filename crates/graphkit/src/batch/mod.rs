//! JSON batching
//!
//! Up to [`MAX_BATCH_STEPS`] sub-requests travel in one `POST /$batch` call.
//! [`BatchRequestContent`] builds and serializes one batch,
//! [`BatchRequestContentCollection`] spreads any number of steps over several,
//! and the response types split the answer back into per-step responses.

mod request_collection;
mod request_content;
mod response_collection;
mod response_content;
mod step;

pub use request_collection::BatchRequestContentCollection;
pub use request_content::{BatchRequestContent, MAX_BATCH_STEPS};
pub use response_collection::BatchResponseContentCollection;
pub use response_content::BatchResponseContent;
pub use step::BatchStep;
