//! API resource endpoints
//!
//! Resources hang off [`GraphClient`](crate::GraphClient) and share its pipeline.

pub mod batch;

pub use batch::Batches;
