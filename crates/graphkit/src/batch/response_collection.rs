//! Responses of several physical batches merged by step id

use super::response_content::BatchResponseContent;
use crate::error::Result;
use crate::http::Response;
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Merged responses of a [`BatchRequestContentCollection`](super::BatchRequestContentCollection).
///
/// Step ids are unique across a collection, so one lookup table covers every batch.
#[derive(Debug, Clone, Default)]
pub struct BatchResponseContentCollection {
    merged: BatchResponseContent,
    batches: usize,
}

impl BatchResponseContentCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the responses of one physical batch.
    pub fn push(&mut self, content: BatchResponseContent) {
        self.merged.merge(content);
        self.batches += 1;
    }

    /// Number of physical batches merged.
    pub fn batch_count(&self) -> usize {
        self.batches
    }

    /// Response of step `id`.
    pub fn get(&self, id: &str) -> Option<&Response> {
        self.merged.get(id)
    }

    /// Deserialize the body of step `id`; see [`BatchResponseContent::get_typed`].
    pub fn get_typed<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.merged.get_typed(id)
    }

    /// Raw body of step `id`; see [`BatchResponseContent::get_stream`].
    pub fn get_stream(&self, id: &str) -> Result<Option<Bytes>> {
        self.merged.get_stream(id)
    }

    /// Status of every step across all batches.
    pub fn status_codes(&self) -> HashMap<String, StatusCode> {
        self.merged.status_codes()
    }

    /// Step ids, batch by batch in the order the service returned them.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.merged.ids()
    }

    /// Number of step responses.
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    /// Whether there are no step responses.
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn content(body: &str) -> BatchResponseContent {
        BatchResponseContent::from_response(Response::new(StatusCode::OK, HeaderMap::new(), body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_merge_batches() {
        let mut collection = BatchResponseContentCollection::new();
        collection.push(content(r#"{"responses":[{"id":"1","status":200,"body":{"v":1}}]}"#));
        collection.push(content(r#"{"responses":[{"id":"2","status":503}]}"#));

        assert_eq!(collection.batch_count(), 2);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get_typed::<serde_json::Value>("1").unwrap()["v"], 1);
        assert_eq!(collection.status_codes()["2"], StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(collection.ids().collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
